//! Poll cadence with a single outstanding request.
//!
//! The sensor answers one command at a time, so the next poll is armed only
//! once the previous cycle has completed. A slow cycle delays the cadence
//! instead of stacking polls.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Where the scheduler is in the poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Polling has not started.
    Idle,
    /// A poll command is outstanding.
    AwaitingLine { since: Instant },
    /// The next poll fires at the given instant.
    TimerArmed { at: Instant },
}

/// What the caller must do when the deadline is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineAction {
    /// Send one poll command.
    Poll,
    /// The outstanding poll was abandoned; the timer is armed again.
    ResponseTimedOut,
    /// Nothing was due.
    None,
}

/// Edge-triggered poll scheduler.
#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    response_timeout: Option<Duration>,
    state: PollState,
    polls: u64,
}

impl PollScheduler {
    pub fn new(interval: Duration, response_timeout: Option<Duration>) -> Self {
        Self {
            interval,
            response_timeout,
            state: PollState::Idle,
            polls: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of polls requested so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn is_started(&self) -> bool {
        self.state != PollState::Idle
    }

    pub fn is_awaiting_line(&self) -> bool {
        matches!(self.state, PollState::AwaitingLine { .. })
    }

    /// Start the poll chain. Returns `true` when the caller must send the
    /// first poll now; later calls are no-ops.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state != PollState::Idle {
            return false;
        }
        self.begin_poll(now);
        true
    }

    /// Close the current cycle and arm the timer for the next poll.
    ///
    /// Returns `false` when no poll was outstanding.
    pub fn complete_cycle(&mut self, now: Instant) -> bool {
        if !self.is_awaiting_line() {
            return false;
        }
        self.arm(now);
        true
    }

    /// The next instant the control loop must wake up for.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PollState::Idle => None,
            PollState::AwaitingLine { since } => self.response_timeout.map(|t| since + t),
            PollState::TimerArmed { at } => Some(at),
        }
    }

    /// Handle the deadline returned by [`deadline`](Self::deadline).
    pub fn on_deadline(&mut self, now: Instant) -> DeadlineAction {
        match self.state {
            PollState::TimerArmed { at } if now >= at => {
                self.begin_poll(now);
                DeadlineAction::Poll
            }
            PollState::AwaitingLine { since } => match self.response_timeout {
                Some(timeout) if now >= since + timeout => {
                    self.arm(now);
                    DeadlineAction::ResponseTimedOut
                }
                _ => DeadlineAction::None,
            },
            _ => DeadlineAction::None,
        }
    }

    fn begin_poll(&mut self, now: Instant) {
        self.polls += 1;
        self.state = PollState::AwaitingLine { since: now };
    }

    fn arm(&mut self, now: Instant) {
        let at = now + self.interval;
        debug!(in_ms = self.interval.as_millis() as u64, "Next poll armed");
        self.state = PollState::TimerArmed { at };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(3);
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_idle_has_no_deadline() {
        let sched = PollScheduler::new(INTERVAL, Some(TIMEOUT));
        assert_eq!(sched.state(), PollState::Idle);
        assert_eq!(sched.deadline(), None);
        assert!(!sched.is_started());
    }

    #[test]
    fn test_start_once() {
        let now = Instant::now();
        let mut sched = PollScheduler::new(INTERVAL, None);

        assert!(sched.start(now));
        assert!(!sched.start(now));
        assert_eq!(sched.polls(), 1);
        assert!(sched.is_awaiting_line());
    }

    #[test]
    fn test_cycle_arms_exactly_one_poll() {
        let t0 = Instant::now();
        let mut sched = PollScheduler::new(INTERVAL, None);
        sched.start(t0);

        let t1 = t0 + Duration::from_millis(200);
        assert!(sched.complete_cycle(t1));
        assert_eq!(sched.deadline(), Some(t1 + INTERVAL));

        // A second completion for the same cycle schedules nothing more
        assert!(!sched.complete_cycle(t1));
        assert_eq!(sched.deadline(), Some(t1 + INTERVAL));

        // Early wake-up does not poll
        assert_eq!(sched.on_deadline(t1), DeadlineAction::None);

        assert_eq!(sched.on_deadline(t1 + INTERVAL), DeadlineAction::Poll);
        assert_eq!(sched.polls(), 2);
        assert!(sched.is_awaiting_line());

        // No further poll while one is outstanding
        assert_eq!(sched.on_deadline(t1 + INTERVAL * 5), DeadlineAction::None);
        assert_eq!(sched.polls(), 2);
    }

    #[test]
    fn test_interval_measured_from_cycle_end() {
        let t0 = Instant::now();
        let mut sched = PollScheduler::new(INTERVAL, None);
        sched.start(t0);

        // Slow response: cadence shifts instead of overlapping
        let slow = t0 + Duration::from_secs(10);
        sched.complete_cycle(slow);
        assert_eq!(sched.deadline(), Some(slow + INTERVAL));
    }

    #[test]
    fn test_response_timeout() {
        let t0 = Instant::now();
        let mut sched = PollScheduler::new(INTERVAL, Some(TIMEOUT));
        sched.start(t0);

        assert_eq!(sched.deadline(), Some(t0 + TIMEOUT));
        assert_eq!(
            sched.on_deadline(t0 + TIMEOUT),
            DeadlineAction::ResponseTimedOut
        );
        assert_eq!(sched.deadline(), Some(t0 + TIMEOUT + INTERVAL));
        assert!(!sched.is_awaiting_line());
    }

    #[test]
    fn test_no_timeout_waits_forever() {
        let t0 = Instant::now();
        let mut sched = PollScheduler::new(INTERVAL, None);
        sched.start(t0);

        assert_eq!(sched.deadline(), None);
        assert_eq!(
            sched.on_deadline(t0 + Duration::from_secs(3600)),
            DeadlineAction::None
        );
        assert!(sched.is_awaiting_line());
    }

    #[test]
    fn test_complete_before_start_is_ignored() {
        let mut sched = PollScheduler::new(INTERVAL, None);
        assert!(!sched.complete_cycle(Instant::now()));
        assert_eq!(sched.state(), PollState::Idle);
    }
}

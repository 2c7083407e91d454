//! The poll-and-publish control loop.
//!
//! One task multiplexes device frames, the scheduler deadline, sink events
//! and the shutdown signal. Each event is handled to completion before the
//! next one is taken, so at most one poll is ever outstanding.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionStateMachine, SinkEvent, Transition};
use crate::device::{DeviceError, DeviceReader};
use crate::error::{BridgeError, Result};
use crate::publisher::{PublishError, PublishStats, Publisher};
use crate::scheduler::{DeadlineAction, PollScheduler};
use crate::sink::Sink;
use crate::status::StatusReporter;

/// Counters kept by the control loop.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BridgeStats {
    /// Poll commands written to the device.
    pub polls_sent: u64,
    /// Poll commands that could not be written.
    pub poll_errors: u64,
    /// Frames received from the device.
    pub frames: u64,
    /// Frames decoded into readings.
    pub readings: u64,
    /// Frames that could not be decoded.
    pub malformed: u64,
    /// Frames received while no poll was outstanding.
    pub unsolicited: u64,
    /// Polls abandoned after the response timeout.
    pub timeouts: u64,
    /// Publisher outcome counters.
    pub publish: PublishStats,
}

enum Step {
    Shutdown,
    Sink(Option<SinkEvent>),
    Frame(std::result::Result<Option<String>, DeviceError>),
    Deadline,
}

/// Drives one device and one sink until shutdown.
pub struct Bridge<S, K> {
    device: DeviceReader<S>,
    publisher: Publisher<K>,
    events: mpsc::Receiver<SinkEvent>,
    connection: ConnectionStateMachine,
    scheduler: PollScheduler,
    status: Option<StatusReporter>,
    stats: BridgeStats,
}

impl<S, K> Bridge<S, K>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Sink,
{
    pub fn new(
        device: DeviceReader<S>,
        publisher: Publisher<K>,
        events: mpsc::Receiver<SinkEvent>,
        scheduler: PollScheduler,
    ) -> Self {
        Self {
            device,
            publisher,
            events,
            connection: ConnectionStateMachine::new(),
            scheduler,
            status: None,
            stats: BridgeStats::default(),
        }
    }

    /// Publish running/offline status through `reporter`.
    pub fn with_status(mut self, reporter: StatusReporter) -> Self {
        self.status = Some(reporter);
        self
    }

    pub fn connection(&self) -> &ConnectionStateMachine {
        &self.connection
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            publish: self.publisher.stats(),
            ..self.stats
        }
    }

    /// Run until `shutdown` completes or the device fails.
    ///
    /// Polling starts on the first `connected` sink event, never before.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<BridgeStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.connection.initiate();
        info!(
            device = %self.device.name(),
            topic = %self.publisher.topic(),
            interval_ms = self.scheduler.interval().as_millis() as u64,
            "Waiting for sink connection"
        );

        let mut events_open = true;

        let outcome = loop {
            let deadline = self.scheduler.deadline();

            let step = tokio::select! {
                biased;
                _ = &mut shutdown => Step::Shutdown,
                event = self.events.recv(), if events_open => Step::Sink(event),
                frame = self.device.next_frame() => Step::Frame(frame),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Step::Deadline
                }
            };

            match step {
                Step::Shutdown => {
                    info!("Received shutdown signal");
                    break Ok(());
                }
                Step::Sink(Some(event)) => self.on_sink_event(event).await,
                Step::Sink(None) => {
                    warn!("Sink event channel closed");
                    events_open = false;
                }
                Step::Frame(Ok(Some(frame))) => self.on_frame(frame).await,
                Step::Frame(Ok(None)) => break Err(DeviceError::Closed),
                Step::Frame(Err(e)) => break Err(e),
                Step::Deadline => self.on_deadline().await,
            }
        };

        self.finish(outcome).await
    }

    async fn on_sink_event(&mut self, event: SinkEvent) {
        match self.connection.on_event(&event) {
            Transition::FirstConnect | Transition::Reconnect => {
                self.report_running().await;

                if self.scheduler.start(Instant::now()) {
                    info!(device = %self.device.name(), "Starting poll cycle");
                    self.send_poll().await;
                }
            }
            Transition::Closed => info!("Sink connection closed"),
            Transition::Reset | Transition::Unchanged => {}
        }
    }

    async fn on_frame(&mut self, frame: String) {
        self.stats.frames += 1;

        if !self.scheduler.is_awaiting_line() {
            self.stats.unsolicited += 1;
            warn!(frame = %frame.trim(), "Unsolicited frame discarded");
            return;
        }

        debug!(frame = %frame.trim(), "RH-USB frame");

        match self.device.on_line(&frame) {
            Ok(reading) => {
                self.stats.readings += 1;
                match self.publisher.publish(reading, &self.connection).await {
                    Ok(()) => {}
                    Err(PublishError::NotConnected) => {
                        warn!(state = %self.connection.state(), "Sink not connected, reading dropped");
                    }
                    Err(e) => error!(error = %e, "Failed to publish reading"),
                }
            }
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, "Discarding frame");
            }
        }

        self.scheduler.complete_cycle(Instant::now());
    }

    async fn on_deadline(&mut self) {
        match self.scheduler.on_deadline(Instant::now()) {
            DeadlineAction::Poll => self.send_poll().await,
            DeadlineAction::ResponseTimedOut => {
                self.stats.timeouts += 1;
                warn!(device = %self.device.name(), "No response from device, poll abandoned");
            }
            DeadlineAction::None => {}
        }
    }

    async fn send_poll(&mut self) {
        match self.device.send_poll_command().await {
            Ok(()) => self.stats.polls_sent += 1,
            Err(e) => {
                self.stats.poll_errors += 1;
                error!(error = %e, "Poll command failed");
                self.scheduler.complete_cycle(Instant::now());
            }
        }
    }

    async fn report_running(&self) {
        if let Some(status) = &self.status {
            if let Err(e) = status
                .publish_running(&self.publisher, &self.connection)
                .await
            {
                warn!(error = %e, "Failed to publish running status");
            }
        }
    }

    async fn finish(self, outcome: std::result::Result<(), DeviceError>) -> Result<BridgeStats> {
        let stats = self.stats();

        if let Some(status) = &self.status {
            if self.connection.can_publish() {
                let published = match &outcome {
                    Ok(()) => status.publish_offline(&self.publisher, &self.connection).await,
                    Err(e) => {
                        status
                            .publish_error(&self.publisher, &self.connection, e.to_string())
                            .await
                    }
                };
                if let Err(e) = published {
                    warn!(error = %e, "Failed to publish final status");
                }
            }
        }

        self.publisher.close().await;

        info!(
            polls = stats.polls_sent,
            readings = stats.readings,
            malformed = stats.malformed,
            timeouts = stats.timeouts,
            published = stats.publish.success,
            dropped = stats.publish.dropped,
            "Bridge stopped"
        );

        outcome.map(|()| stats).map_err(BridgeError::from)
    }
}

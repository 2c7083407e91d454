//! Sink connectivity state machine.
//!
//! ```text
//! Disconnected --initiate--> Connecting --connected--> Connected --closed--> Closed
//!       ^                                                  |
//!       +-------------------- error (any state) -----------+
//! ```
//!
//! A `connected` event seen from `Closed` or `Disconnected` starts a new
//! connection instance. Publishing is allowed only while `Connected`.

use std::fmt;

use tracing::{debug, info, warn};

/// Connectivity of the publish sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Connected,
    Closed,
    Error(String),
}

/// Outcome of feeding an event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State did not change.
    Unchanged,
    /// First time the sink became reachable.
    FirstConnect,
    /// The sink became reachable again after a close or error.
    Reconnect,
    /// The connection was closed by the sink.
    Closed,
    /// A sink error reset the state.
    Reset,
}

/// Tracks sink connectivity and gates publishing.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    connections: u64,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of times `Connected` has been entered.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// True iff the sink can accept messages.
    pub fn can_publish(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Start connecting. Only valid from `Disconnected`; returns whether the
    /// state changed.
    pub fn initiate(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "initiate ignored");
            return false;
        }

        self.set(ConnectionState::Connecting);
        true
    }

    /// Apply a sink event.
    pub fn on_event(&mut self, event: &SinkEvent) -> Transition {
        match event {
            SinkEvent::Connected => self.on_connected(),
            SinkEvent::Closed => self.on_closed(),
            SinkEvent::Error(message) => {
                warn!(state = %self.state, error = %message, "Sink connection error");
                if self.state == ConnectionState::Disconnected {
                    return Transition::Unchanged;
                }
                self.set(ConnectionState::Disconnected);
                Transition::Reset
            }
        }
    }

    fn on_connected(&mut self) -> Transition {
        match self.state {
            ConnectionState::Connected => Transition::Unchanged,
            ConnectionState::Connecting => {
                self.enter_connected();
                if self.connections == 1 {
                    Transition::FirstConnect
                } else {
                    Transition::Reconnect
                }
            }
            ConnectionState::Closed | ConnectionState::Disconnected => {
                self.set(ConnectionState::Connecting);
                self.on_connected()
            }
        }
    }

    fn on_closed(&mut self) -> Transition {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "close event ignored");
            return Transition::Unchanged;
        }

        self.set(ConnectionState::Closed);
        Transition::Closed
    }

    fn enter_connected(&mut self) {
        self.connections += 1;
        self.set(ConnectionState::Connected);
        info!(connections = self.connections, "Sink connected");
    }

    fn set(&mut self, next: ConnectionState) {
        debug!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
    }
}

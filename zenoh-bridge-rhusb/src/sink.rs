//! Publish sinks.
//!
//! A sink accepts `(topic, payload)` messages and reports its connectivity
//! as [`SinkEvent`]s on a channel owned by the control loop.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sensorbridge_common::ZenohConfig;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use zenoh::Session;

use crate::connection::SinkEvent;

/// Capacity of the sink event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// A serialized reading bound for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Payload as text, for logging.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Errors returned by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to publish to {topic}: {message}")]
    Send { topic: String, message: String },
}

/// Destination for published messages.
pub trait Sink: Send + Sync {
    /// Hand one message to the transport. Fire-and-forget.
    fn put(&self, message: PublishMessage) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Release the transport.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Sink publishing through a Zenoh session.
pub struct ZenohSink {
    session: Session,
    events: mpsc::Sender<SinkEvent>,
    reported_connected: Arc<AtomicBool>,
    monitor: JoinHandle<()>,
}

impl ZenohSink {
    /// Open a session and start watching its connectivity.
    ///
    /// Credential and session errors are returned here and are fatal for the
    /// bridge. Connectivity changes arrive later on the returned channel.
    pub async fn connect(
        config: &ZenohConfig,
        check_interval: Duration,
    ) -> sensorbridge_common::Result<(Self, mpsc::Receiver<SinkEvent>)> {
        let session = sensorbridge_common::connect(config).await?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reported_connected = Arc::new(AtomicBool::new(false));

        let monitor = tokio::spawn(monitor_connectivity(
            session.clone(),
            config.is_client(),
            check_interval,
            tx.clone(),
            reported_connected.clone(),
        ));

        Ok((
            Self {
                session,
                events: tx,
                reported_connected,
                monitor,
            },
            rx,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Sink for ZenohSink {
    async fn put(&self, message: PublishMessage) -> Result<(), SinkError> {
        let PublishMessage { topic, payload } = message;

        let result = self.session.put(topic.as_str(), payload).await;
        if let Err(e) = result {
            if self.events.try_send(SinkEvent::Error(e.to_string())).is_err() {
                debug!("Sink event channel full or closed");
            }
            // Force the monitor to announce connectivity again, after the error
            self.reported_connected.store(false, Ordering::SeqCst);

            return Err(SinkError::Send {
                topic,
                message: e.to_string(),
            });
        }

        Ok(())
    }

    async fn close(&self) {
        self.monitor.abort();
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Error closing Zenoh session");
        }
    }
}

/// Emit `Connected`/`Closed` whenever reachability changes.
///
/// In client mode the sink is reachable while at least one router is
/// connected. Peers and routers are reachable as soon as the session is open.
async fn monitor_connectivity(
    session: Session,
    needs_router: bool,
    check_interval: Duration,
    events: mpsc::Sender<SinkEvent>,
    reported_connected: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let connected = if needs_router {
            session.info().routers_zid().await.count() > 0
        } else {
            true
        };

        let was_connected = reported_connected.swap(connected, Ordering::SeqCst);
        let event = match (was_connected, connected) {
            (false, true) => SinkEvent::Connected,
            (true, false) => SinkEvent::Closed,
            _ => continue,
        };

        debug!(?event, "Sink connectivity changed");
        if events.send(event).await.is_err() {
            break;
        }
    }
}

/// In-process sink that keeps every message.
///
/// Can be told to fail, to exercise send-error paths.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<PublishMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<PublishMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for MemorySink {
    async fn put(&self, message: PublishMessage) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Send {
                topic: message.topic,
                message: "sink unavailable".to_string(),
            });
        }

        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
        Ok(())
    }

    async fn close(&self) {}
}

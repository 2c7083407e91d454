//! Reading publisher, gated by sink connectivity.

use sensorbridge_common::Reading;
use thiserror::Error;
use tracing::{info, warn};

use crate::connection::ConnectionStateMachine;
use crate::sink::{PublishMessage, Sink, SinkError};

/// Why a reading was not published.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Sink not connected, reading dropped")]
    NotConnected,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Send(#[from] SinkError),
}

/// Serializes readings and hands them to a sink.
pub struct Publisher<K> {
    sink: K,
    topic: String,
    stats: PublishStats,
}

impl<K: Sink> Publisher<K> {
    pub fn new(sink: K, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
            stats: PublishStats::default(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Publish one reading on the configured topic.
    ///
    /// While the connection cannot publish, nothing reaches the sink and the
    /// reading is dropped. Send failures are not retried.
    pub async fn publish(
        &mut self,
        reading: Reading,
        connection: &ConnectionStateMachine,
    ) -> Result<(), PublishError> {
        if !connection.can_publish() {
            self.stats.dropped += 1;
            return Err(PublishError::NotConnected);
        }

        let payload = reading
            .to_json()
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        let message = PublishMessage::new(self.topic.clone(), payload);

        info!(topic = %message.topic, payload = %message.payload_str(), "Publish");

        match self.sink.put(message).await {
            Ok(()) => {
                self.stats.success += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.failed += 1;
                Err(e.into())
            }
        }
    }

    /// Publish a JSON document to an arbitrary key (status messages, etc.).
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        connection: &ConnectionStateMachine,
    ) -> Result<(), PublishError> {
        if !connection.can_publish() {
            return Err(PublishError::NotConnected);
        }

        let payload =
            serde_json::to_vec(value).map_err(|e| PublishError::Serialization(e.to_string()))?;
        self.sink.put(PublishMessage::new(key, payload)).await?;
        Ok(())
    }

    /// Close the underlying sink.
    pub async fn close(&self) {
        self.sink.close().await;
        if self.stats.total() > 0 {
            info!(
                published = self.stats.success,
                failed = self.stats.failed,
                dropped = self.stats.dropped,
                success_rate = self.stats.success_rate(),
                "Publisher closed"
            );
        } else {
            warn!("Publisher closed without publishing");
        }
    }
}

/// Publish outcome counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Readings handed to the sink successfully.
    pub success: usize,
    /// Readings the sink rejected.
    pub failed: usize,
    /// Readings dropped because the sink was not connected.
    pub dropped: usize,
}

impl PublishStats {
    /// Total number of readings offered to the publisher.
    pub fn total(&self) -> usize {
        self.success + self.failed + self.dropped
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}

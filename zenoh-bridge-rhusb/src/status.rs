//! Bridge status reporting.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionStateMachine;
use crate::publisher::{PublishError, Publisher};
use crate::sink::Sink;

/// Bridge status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running", "offline", "error").
    pub status: String,
    /// Additional metadata (client id, device, topic).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    /// Create a new status with "running" state.
    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_state(bridge, version, "running")
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_state(bridge, version, "offline")
    }

    /// Create a status with "error" state.
    pub fn error(
        bridge: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::with_state(bridge, version, "error")
            .with_metadata(serde_json::json!({ "error": error.into() }))
    }

    fn with_state(
        bridge: impl Into<String>,
        version: impl Into<String>,
        status: &str,
    ) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: status.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Publishes status documents on `<topic>/@/status`.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    key: String,
    bridge: String,
    version: String,
    metadata: serde_json::Value,
}

impl StatusReporter {
    pub fn new(
        key: impl Into<String>,
        bridge: impl Into<String>,
        version: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            key: key.into(),
            bridge: bridge.into(),
            version: version.into(),
            metadata,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish "running" status.
    pub async fn publish_running<K: Sink>(
        &self,
        publisher: &Publisher<K>,
        connection: &ConnectionStateMachine,
    ) -> Result<(), PublishError> {
        let status = BridgeStatus::running(&self.bridge, &self.version)
            .with_metadata(self.metadata.clone());
        publisher.publish_json(&self.key, &status, connection).await
    }

    /// Publish "offline" status.
    pub async fn publish_offline<K: Sink>(
        &self,
        publisher: &Publisher<K>,
        connection: &ConnectionStateMachine,
    ) -> Result<(), PublishError> {
        let status = BridgeStatus::offline(&self.bridge, &self.version)
            .with_metadata(self.metadata.clone());
        publisher.publish_json(&self.key, &status, connection).await
    }

    /// Publish "error" status.
    pub async fn publish_error<K: Sink>(
        &self,
        publisher: &Publisher<K>,
        connection: &ConnectionStateMachine,
        error: impl Into<String>,
    ) -> Result<(), PublishError> {
        let status = BridgeStatus::error(&self.bridge, &self.version, error);
        publisher.publish_json(&self.key, &status, connection).await
    }
}

//! Configuration for the RH-USB bridge.

use sensorbridge_common::config::{LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhusbBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Serial sensor settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Where and how readings are published
    #[serde(default)]
    pub publish: PublishConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
    #[serde(default = "default_device_path")]
    pub path: String,

    /// Baud rate (default: 9600)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Command written to request one reading (default: "PA\r\n")
    #[serde(default = "default_poll_command")]
    pub poll_command: String,

    /// Characters stripped from both ends of every frame (default: "<>")
    #[serde(default = "default_frame_markers")]
    pub frame_markers: String,

    /// Delay between the end of one reading cycle and the next poll
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a response before giving up on a poll (0 = forever)
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_device_path() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_poll_command() -> String {
    "PA\r\n".to_string()
}

fn default_frame_markers() -> String {
    "<>".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_response_timeout_ms() -> u64 {
    5000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            baud_rate: default_baud_rate(),
            poll_command: default_poll_command(),
            frame_markers: default_frame_markers(),
            poll_interval_ms: default_poll_interval_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Response timeout, `None` when disabled.
    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }
}

/// Publishing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Topic (key expression) readings are published on
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Identifier of this bridge instance, reported in status messages
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Publish running/offline status on `<topic>/@/status`
    #[serde(default = "default_status")]
    pub status: bool,

    /// How often sink connectivity is checked
    #[serde(default = "default_connection_check_ms")]
    pub connection_check_ms: u64,
}

fn default_topic() -> String {
    "nuc/temperature".to_string()
}

fn default_client_id() -> String {
    "nuc-awspub".to_string()
}

fn default_status() -> bool {
    true
}

fn default_connection_check_ms() -> u64 {
    1000
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            client_id: default_client_id(),
            status: default_status(),
            connection_check_ms: default_connection_check_ms(),
        }
    }
}

impl PublishConfig {
    pub fn connection_check(&self) -> Duration {
        Duration::from_millis(self.connection_check_ms)
    }

    /// Key the bridge status is published on.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.topic)
    }
}

impl RhusbBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RhusbBridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zenoh
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.device.path.is_empty() {
            return Err(ConfigError::Validation(
                "Device path cannot be empty".to_string(),
            ));
        }

        if self.device.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "Device baud_rate must be greater than 0".to_string(),
            ));
        }

        if self.device.poll_command.is_empty() {
            return Err(ConfigError::Validation(
                "Device poll_command cannot be empty".to_string(),
            ));
        }

        if self.device.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Device poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.publish.topic.is_empty() {
            return Err(ConfigError::Validation(
                "Publish topic cannot be empty".to_string(),
            ));
        }

        if let Some(c) = self
            .publish
            .topic
            .chars()
            .find(|c| matches!(c, '*' | '$' | '?' | '#'))
        {
            return Err(ConfigError::Validation(format!(
                "Publish topic '{}' must not contain '{}'",
                self.publish.topic, c
            )));
        }

        if self.publish.topic.starts_with('/') || self.publish.topic.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "Publish topic '{}' must not start or end with '/'",
                self.publish.topic
            )));
        }

        if self.publish.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "Publish client_id cannot be empty".to_string(),
            ));
        }

        if self.publish.connection_check_ms == 0 {
            return Err(ConfigError::Validation(
                "Publish connection_check_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

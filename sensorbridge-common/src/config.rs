use serde::{Deserialize, Serialize};

use crate::credentials::TlsConfig;
use crate::error::{Error, Result};

/// Common Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,

    /// TLS credentials for `tls/` and `quic/` endpoints.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
            tls: None,
        }
    }
}

impl ZenohConfig {
    /// Check that the mode is one Zenoh understands.
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "client" | "peer" | "router" => {}
            other => {
                return Err(Error::Config(format!(
                    "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                    other
                )));
            }
        }

        if self.mode == "client" && self.connect.is_empty() {
            tracing::warn!("Client mode without connect endpoints relies on scouting");
        }

        Ok(())
    }

    /// Whether connectivity depends on reaching a router.
    pub fn is_client(&self) -> bool {
        self.mode == "client"
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_zenoh_config() {
        let input = r#"
        {
            zenoh: {
                mode: "client",
                connect: ["tls/broker.example.com:7447"],
                tls: {
                    root_ca_certificate: "/keys/rootca.pem",
                },
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: TestConfig = json5::from_str(input).unwrap();

        assert_eq!(config.zenoh.mode, "client");
        assert!(config.zenoh.is_client());
        assert_eq!(config.zenoh.connect, vec!["tls/broker.example.com:7447"]);
        let tls = config.zenoh.tls.expect("tls section");
        assert_eq!(tls.root_ca_certificate.as_deref(), Some("/keys/rootca.pem"));
        assert!(tls.connect_certificate.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_config() {
        let config: TestConfig = json5::from_str("{}").unwrap();

        assert_eq!(config.zenoh.mode, "peer");
        assert!(config.zenoh.connect.is_empty());
        assert!(config.zenoh.tls.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_json_logging_format() {
        let input = r#"{ logging: { level: "debug", format: "json" } }"#;
        let config: TestConfig = json5::from_str(input).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_mode() {
        let mut config = ZenohConfig::default();
        assert!(config.validate().is_ok());

        config.mode = "broker".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}

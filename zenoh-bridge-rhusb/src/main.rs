//! Zenoh bridge for RH-USB sensors.
//!
//! Polls the sensor over its serial port and publishes readings to Zenoh.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sensorbridge_common::LoggingConfig;
use tracing::info;
use zenoh_bridge_rhusb::config::RhusbBridgeConfig;
use zenoh_bridge_rhusb::status::StatusReporter;
use zenoh_bridge_rhusb::{Bridge, DeviceReader, PollScheduler, Publisher, ZenohSink};

/// Zenoh bridge for RH-USB temperature/humidity sensors.
#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-rhusb")]
#[command(about = "Polls an RH-USB sensor and publishes readings to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "rhusb.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = RhusbBridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    sensorbridge_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_ms = config.device.poll_interval_ms,
        "Starting zenoh-bridge-rhusb"
    );
    info!("Loaded configuration from {:?}", args.config);

    // Open the sensor first: nothing is scheduled if this fails
    info!(device = %config.device.path, "Opening RH-USB serial port");
    let device = DeviceReader::open(&config.device.path, config.device.baud_rate)
        .context("Could not open sensor")?
        .with_poll_command(config.device.poll_command.as_bytes().to_vec())
        .with_frame_markers(&config.device.frame_markers);

    // Load credentials and connect to Zenoh
    let (sink, events) = ZenohSink::connect(&config.zenoh, config.publish.connection_check())
        .await
        .context("Unable to set up Zenoh sink")?;

    let publisher = Publisher::new(sink, config.publish.topic.clone());
    let scheduler = PollScheduler::new(
        config.device.poll_interval(),
        config.device.response_timeout(),
    );

    let mut bridge = Bridge::new(device, publisher, events, scheduler);

    if config.publish.status {
        bridge = bridge.with_status(StatusReporter::new(
            config.publish.status_key(),
            "rhusb",
            env!("CARGO_PKG_VERSION"),
            serde_json::json!({
                "client_id": config.publish.client_id,
                "device": config.device.path,
                "topic": config.publish.topic,
                "poll_interval_ms": config.device.poll_interval_ms,
            }),
        ));
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let stats = bridge.run_until(shutdown).await.context("Bridge stopped")?;

    info!(
        polls = stats.polls_sent,
        published = stats.publish.success,
        "RH-USB bridge stopped"
    );

    Ok(())
}

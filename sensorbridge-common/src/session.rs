use zenoh::Session;

use crate::config::ZenohConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Connect to Zenoh using the provided configuration.
///
/// TLS credentials are loaded before the session is opened, so a missing key
/// file fails here with [`Error::Credential`].
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_zenoh_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        tls = config.tls.is_some(),
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

/// Translate the bridge configuration into a native Zenoh configuration.
pub fn build_zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    config.validate()?;

    let mut zenoh_config = zenoh::Config::default();

    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    // Set connect endpoints
    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)
            .map_err(|e| Error::Config(format!("Failed to serialize connect endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("connect/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set connect endpoints: {}", e)))?;
    }

    // Set listen endpoints
    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)
            .map_err(|e| Error::Config(format!("Failed to serialize listen endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("listen/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set listen endpoints: {}", e)))?;
    }

    if let Some(tls) = &config.tls {
        let credentials = tls.load()?;
        apply_credentials(&mut zenoh_config, &credentials)?;
    }

    Ok(zenoh_config)
}

fn apply_credentials(zenoh_config: &mut zenoh::Config, credentials: &Credentials) -> Result<()> {
    let entries = [
        ("root_ca_certificate", &credentials.root_ca_certificate),
        ("connect_certificate", &credentials.connect_certificate),
        ("connect_private_key", &credentials.connect_private_key),
    ];

    for (name, path) in entries {
        if let Some(path) = path {
            let value = serde_json::to_string(&path.display().to_string())?;
            zenoh_config
                .insert_json5(&format!("transport/link/tls/{}", name), &value)
                .map_err(|e| Error::Config(format!("Failed to set TLS {}: {}", name, e)))?;
        }
    }

    if credentials.mutual_tls() {
        zenoh_config
            .insert_json5("transport/link/tls/enable_mtls", "true")
            .map_err(|e| Error::Config(format!("Failed to enable mTLS: {}", e)))?;
    }

    Ok(())
}

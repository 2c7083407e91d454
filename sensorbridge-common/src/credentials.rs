//! TLS credential loading for the Zenoh transport.
//!
//! Credentials are checked once at startup. A missing or unreadable key file
//! is an initialization error and the bridge refuses to start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const PEM_MARKER: &str = "-----BEGIN ";

/// Paths to the PEM files used to authenticate against the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA certificate used to verify the broker.
    #[serde(default)]
    pub root_ca_certificate: Option<String>,

    /// Client certificate for mutual TLS.
    #[serde(default)]
    pub connect_certificate: Option<String>,

    /// Private key matching `connect_certificate`.
    #[serde(default)]
    pub connect_private_key: Option<String>,
}

/// Credential files that have been read and checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub root_ca_certificate: Option<PathBuf>,
    pub connect_certificate: Option<PathBuf>,
    pub connect_private_key: Option<PathBuf>,
}

impl Credentials {
    /// Whether a client certificate/key pair is present.
    pub fn mutual_tls(&self) -> bool {
        self.connect_certificate.is_some() && self.connect_private_key.is_some()
    }
}

impl TlsConfig {
    /// Read every configured file and check that it holds PEM data.
    pub fn load(&self) -> Result<Credentials> {
        match (&self.connect_certificate, &self.connect_private_key) {
            (Some(_), None) => {
                return Err(Error::credential(
                    "connect_private_key",
                    "connect_certificate is set but the private key is missing",
                ));
            }
            (None, Some(_)) => {
                return Err(Error::credential(
                    "connect_certificate",
                    "connect_private_key is set but the certificate is missing",
                ));
            }
            _ => {}
        }

        let credentials = Credentials {
            root_ca_certificate: self
                .root_ca_certificate
                .as_deref()
                .map(check_pem_file)
                .transpose()?,
            connect_certificate: self
                .connect_certificate
                .as_deref()
                .map(check_pem_file)
                .transpose()?,
            connect_private_key: self
                .connect_private_key
                .as_deref()
                .map(check_pem_file)
                .transpose()?,
        };

        tracing::debug!(
            root_ca = ?credentials.root_ca_certificate,
            mutual_tls = credentials.mutual_tls(),
            "Loaded TLS credentials"
        );

        Ok(credentials)
    }
}

fn check_pem_file(path: &str) -> Result<PathBuf> {
    let content = std::fs::read_to_string(Path::new(path))
        .map_err(|e| Error::credential(path, e.to_string()))?;

    if !content.contains(PEM_MARKER) {
        return Err(Error::credential(path, "file does not contain PEM data"));
    }

    Ok(PathBuf::from(path))
}

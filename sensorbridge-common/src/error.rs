use thiserror::Error;

/// Common error type for sensor bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load credential '{path}': {message}")]
    Credential { path: String, message: String },

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a credential loading error.
    pub fn credential(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

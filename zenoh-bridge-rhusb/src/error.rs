//! Error types for the bridge.

use thiserror::Error;

use crate::device::DeviceError;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that stop a running bridge.
///
/// Everything else (malformed frames, publishes while disconnected, sink
/// errors) is logged and the loop keeps polling.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The sensor stopped responding at the transport level.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_is_transparent() {
        let err = BridgeError::from(DeviceError::Closed);
        assert_eq!(err.to_string(), "Device stream closed");
    }
}

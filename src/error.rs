//! Error types for MAKCU driver operations.

use thiserror::Error;

/// Primary error type for MAKCU operations.
#[derive(Error, Debug)]
pub enum MakcuError {
    // Enumeration errors
    #[error("No MAKCU devices found")]
    NoDevicesFound,

    #[error("Device not found: {port}")]
    DeviceNotFound { port: String },

    // Transport errors
    #[error("Failed to open port '{port}': {reason}")]
    OpenFailed { port: String, reason: String },

    #[error("Not connected")]
    Disconnected,

    // Command errors
    #[error("Command '{command}' timed out")]
    Timeout { command: String },

    #[error("Invalid {what} {value}: out of accepted range ({limit})")]
    Validation {
        what: &'static str,
        value: i64,
        limit: i64,
    },

    #[error("Unexpected device response: {response}")]
    Protocol { response: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MakcuError {
    /// Returns true if the error indicates a lost or absent connection,
    /// which a caller may reasonably retry.
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NoDevicesFound
                | Self::DeviceNotFound { .. }
                | Self::OpenFailed { .. }
                | Self::Disconnected
        )
    }

    /// Returns true if the error was caused by caller-supplied input.
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Convenience type alias for Results using MakcuError.
pub type Result<T> = std::result::Result<T, MakcuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classification() {
        assert!(MakcuError::Disconnected.is_connection_error());
        assert!(MakcuError::NoDevicesFound.is_connection_error());
        assert!(MakcuError::OpenFailed {
            port: "COM3".into(),
            reason: "busy".into()
        }
        .is_connection_error());
        assert!(!MakcuError::Timeout {
            command: "km.version()".into()
        }
        .is_connection_error());
    }

    #[test]
    fn test_validation_error_classification() {
        let err = MakcuError::Validation {
            what: "coordinate",
            value: 40000,
            limit: 32767,
        };
        assert!(err.is_validation_error());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = MakcuError::Timeout {
            command: "km.version()".into(),
        };
        assert_eq!(err.to_string(), "Command 'km.version()' timed out");
    }
}

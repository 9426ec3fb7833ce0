//! Error types for the cache and logging core
//!
//! Errors only surface at collaborator seams (durable store, log outputs,
//! log transports). Public cache and logger operations never return them.

use thiserror::Error;

// == Storage Error Enum ==
/// Failures of the durable key/value store backing cache persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying I/O failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is not usable by this store
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Store is not reachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

// == Log Error Enum ==
/// Failures of a log output or log transport.
#[derive(Error, Debug)]
pub enum LogError {
    /// File or stream I/O failed
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized
    #[error("Log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport failed before a response was received
    #[error("Log transport error: {0}")]
    Transport(String),

    /// Remote endpoint answered with a non-success status
    #[error("Remote endpoint returned status {0}")]
    Status(u16),

    /// Output rejected the entry
    #[error("Log output error: {0}")]
    Output(String),
}

impl From<reqwest::Error> for LogError {
    fn from(err: reqwest::Error) -> Self {
        LogError::Transport(err.to_string())
    }
}

// == Result Type Aliases ==
/// Convenience Result type for durable store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Convenience Result type for log outputs and transports.
pub type LogResult<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Unavailable("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: quota exceeded");
    }

    #[test]
    fn test_log_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LogError = io.into();
        assert!(matches!(err, LogError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_log_error_status() {
        assert_eq!(
            LogError::Status(503).to_string(),
            "Remote endpoint returned status 503"
        );
    }
}

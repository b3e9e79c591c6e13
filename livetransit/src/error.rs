//! Error types shared across the library.
//!
//! Every failure the core can hit is cycle-scoped: a failed fetch aborts one
//! reconciliation cycle, a failed save is logged and dropped. None of these
//! errors stop the poller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching a vehicle snapshot.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request failed at the transport level.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body was not a JSON array of vehicle records.
    #[error("Failed to decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised while loading the trip lookup table.
#[derive(Debug, Error)]
pub enum TripTableError {
    #[error("failed to read trip table {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse trip table {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors raised by the selection persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed selection data: {0}")]
    Format(#[from] serde_json::Error),

    /// No location could be resolved for the selection file.
    #[error("No selection storage location available")]
    NoLocation,
}

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = SourceError::Status {
            status: 503,
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com");
    }

    #[test]
    fn test_decode_error_from_serde() {
        let serde_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: SourceError = serde_err.into();
        assert!(matches!(err, SourceError::Decode(_)));
        assert!(err.to_string().starts_with("Failed to decode snapshot"));
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "poll.interval_ms".to_string(),
            value: "soon".to_string(),
            reason: "expected an integer".to_string(),
        };
        assert!(err.to_string().contains("poll.interval_ms"));
        assert!(err.to_string().contains("soon"));
    }
}

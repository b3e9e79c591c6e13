//! CLI error type.

use livetransit::error::{ConfigError, PersistenceError, SourceError, TripTableError};
use thiserror::Error;

/// Errors surfaced to the user by `main`.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad arguments or unusable settings.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("vehicle feed: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    TripTable(#[from] TripTableError),

    #[error("selection storage: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

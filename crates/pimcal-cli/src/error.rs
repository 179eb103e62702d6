//! Driver error types.

use pimcal_core::{ParseError, TracingError};
use pimcal_storage::StorageError;
use thiserror::Error;

/// Result type for driver operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a driver run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid value: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tracing(#[from] TracingError),
}

//! Error types for Courier core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in typed queue operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Element store error.
    #[error("storage error: {0}")]
    Storage(#[from] courier_storage::StorageError),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a serialization error from any displayable cause.
    pub fn serialization(cause: impl std::fmt::Display) -> Self {
        Self::Serialization(cause.to_string())
    }
}

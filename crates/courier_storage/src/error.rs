//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Out-of-bounds reads are not errors: stores report them as "not found"
/// and fall back to empty defaults. Only genuine I/O failures and broken
/// record chains surface here.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record chain in the backing file is broken.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

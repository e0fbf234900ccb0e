//! Error types for the drain pipeline.

use thiserror::Error;

/// Result type for drain operations.
pub type DrainResult<T> = Result<T, DrainError>;

/// Errors that can occur while draining queues.
#[derive(Error, Debug)]
pub enum DrainError {
    /// The sender failed to deliver a record or batch.
    #[error("send failed: {0}")]
    Send(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// A send did not complete within the configured timeout.
    #[error("send timed out")]
    Timeout,

    /// The collection host is not reachable.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// The pass was cancelled.
    #[error("drain cancelled")]
    Cancelled,

    /// The lane does not belong to this pipeline.
    #[error("unknown lane {0}")]
    UnknownLane(usize),

    /// Queue error while peeking or removing.
    #[error("queue error: {0}")]
    Queue(#[from] courier_core::CoreError),

    /// The pipeline worker has stopped.
    #[error("drain pipeline is shut down")]
    Shutdown,

    /// A worker or send thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl DrainError {
    /// Creates a send failure from any displayable cause.
    pub fn send(cause: impl std::fmt::Display) -> Self {
        Self::Send(cause.to_string())
    }

    /// Returns true if this error came from delivering records rather than
    /// from local storage or pipeline state.
    pub fn is_send_failure(&self) -> bool {
        matches!(
            self,
            DrainError::Send(_) | DrainError::HttpStatus { .. } | DrainError::Timeout
        )
    }
}

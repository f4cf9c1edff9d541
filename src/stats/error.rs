//! Stats server error types.

use thiserror::Error;

/// Errors that can occur in the stats server.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Failed to bind the stats listener.
    #[error("failed to bind stats listener: {0}")]
    BindError(String),

    /// The server is already running.
    #[error("stats server already running")]
    AlreadyRunning,

    /// The server is not running.
    #[error("stats server not running")]
    NotRunning,
}

/// Result type for stats operations.
pub type StatsResult<T> = Result<T, StatsError>;

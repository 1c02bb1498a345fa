//! Worker error types

use sortie_c2_router::RouterError;
use sortie_core::CoreError;
use thiserror::Error;

/// Errors raised by the worker process
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Token endpoint unreachable or returned an unreadable body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token endpoint answered with a non-success status
    #[error("Token request rejected with status {0}")]
    Rejected(u16),

    /// Broker failure
    #[error("Broker error: {0}")]
    Router(#[from] RouterError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

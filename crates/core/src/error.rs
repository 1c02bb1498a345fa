//! Core error types

use thiserror::Error;

/// Core error type shared by the store abstraction and configuration loading
#[derive(Debug, Error)]
pub enum CoreError {
    /// Persistence store unreachable or returned an error
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid or unparsable configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Store(err.to_string())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

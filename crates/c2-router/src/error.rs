//! Router error types

use sortie_domain::DomainError;
use thiserror::Error;

/// Errors raised while publishing or consuming broker messages
#[derive(Debug, Error)]
pub enum RouterError {
    /// Broker unreachable or rejected the command
    #[error("Broker error: {0}")]
    Broker(String),

    /// Consumer group does not exist on the stream
    #[error("No consumer group {group} on stream {stream}")]
    NoGroup {
        /// Stream name
        stream: String,
        /// Group name
        group: String,
    },

    /// Message body could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Mission registry failure during an outbox sweep
    #[error("Registry error: {0}")]
    Registry(#[from] DomainError),
}

#[cfg(feature = "redis-broker")]
impl From<redis::RedisError> for RouterError {
    fn from(err: redis::RedisError) -> Self {
        RouterError::Broker(err.to_string())
    }
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;

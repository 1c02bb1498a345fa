//! Core functionality shared across the Sortie workspace.
//!
//! This crate provides the error type, environment configuration helpers,
//! logging initialisation, and the key-value store abstraction that the
//! mission registry and token authority persist through.

pub mod config;
pub mod error;
pub mod logging;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod store;

pub use error::{CoreError, CoreResult};
pub use logging::LogFormat;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
pub use store::{KvStore, MemoryStore};

/// Current wall-clock time as Unix seconds.
pub fn unix_now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

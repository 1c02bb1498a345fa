//! Dispatch Router - order routing and broker plumbing for Sortie
//!
//! This crate provides:
//! - Broker wire messages (orders and status events)
//! - The [`Broker`] abstraction with Redis Streams and in-memory backends
//! - Direct and shared order routing
//! - The outbox relay that republishes orders whose publish never landed
//!
//! # Architecture
//!
//! Orders flow through the following pipeline:
//! 1. Mission persisted with a dispatch intent by `MissionRegistry::create`
//! 2. Order published by [`DispatchRouter`] onto a direct or shared stream
//! 3. Intent cleared; stuck intents are picked up by [`OutboxRelay`]
//! 4. Workers consume orders and publish [`StatusEvent`]s to `status`
//!
//! # Examples
//!
//! ```no_run
//! use sortie_c2_router::{DispatchRouter, MemoryBroker};
//! use std::sync::Arc;
//!
//! # async fn demo() -> sortie_c2_router::RouterResult<()> {
//! let router = DispatchRouter::new(Arc::new(MemoryBroker::new()));
//! let _route = router
//!     .dispatch("mission-1", &serde_json::json!({"task": "recon"}), Some("soldier-1"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod memory_broker;
pub mod messages;
pub mod outbox;
#[cfg(feature = "redis-broker")]
pub mod redis_broker;

// Re-export commonly used types
pub use broker::{
    direct_stream, Broker, Delivery, BODY_FIELD, COMMANDER_GROUP, ORDERS_DIRECT_PREFIX,
    ORDERS_SHARED_STREAM, STATUS_STREAM, WORKERS_GROUP,
};
pub use dispatcher::{DispatchRouter, Route};
pub use error::{RouterError, RouterResult};
pub use memory_broker::MemoryBroker;
pub use messages::{OrderMessage, StatusEvent};
pub use outbox::OutboxRelay;
#[cfg(feature = "redis-broker")]
pub use redis_broker::RedisStreamBroker;

//! Message broker abstraction.
//!
//! Modeled on Redis Streams: append-only named streams, consumer groups
//! that hand each entry to exactly one member, and explicit acknowledgement.
//! Delivery is at-least-once; consumers must tolerate duplicates.

use crate::error::RouterResult;
use async_trait::async_trait;
use std::time::Duration;

/// Shared queue stream, consumed competitively by [`WORKERS_GROUP`]
pub const ORDERS_SHARED_STREAM: &str = "orders:shared";

/// Prefix of per-worker direct order streams
pub const ORDERS_DIRECT_PREFIX: &str = "orders:direct:";

/// Status event stream drained by the commander
pub const STATUS_STREAM: &str = "status";

/// Consumer group for order streams
pub const WORKERS_GROUP: &str = "workers";

/// Consumer group for the status stream
pub const COMMANDER_GROUP: &str = "commander";

/// Stream entry field holding the JSON body
pub const BODY_FIELD: &str = "body";

/// Direct order stream for one worker
pub fn direct_stream(worker_id: &str) -> String {
    format!("{ORDERS_DIRECT_PREFIX}{worker_id}")
}

/// One entry handed to a group consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Stream the entry was read from
    pub stream: String,
    /// Broker-assigned entry id, used to acknowledge
    pub id: String,
    /// Raw JSON body; empty when the entry had no body field
    pub body: String,
}

/// Stream broker operations.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Create `group` on `stream` (creating the stream too) if absent.
    ///
    /// A new group starts from the beginning of the stream, so entries
    /// published before any consumer existed are still delivered.
    async fn ensure_group(&self, stream: &str, group: &str) -> RouterResult<()>;

    /// Append `body` to `stream`, returning the entry id.
    async fn publish(&self, stream: &str, body: &str) -> RouterResult<String>;

    /// Read up to `count` new entries across `streams` for `consumer` in
    /// `group`, waiting at most `block` when none are available.
    /// `Duration::ZERO` returns immediately.
    async fn read_group(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> RouterResult<Vec<Delivery>>;

    /// Re-read up to `count` entries already delivered to `consumer` in
    /// `group` but never acknowledged, oldest first. Never blocks.
    async fn read_pending(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        count: usize,
    ) -> RouterResult<Vec<Delivery>>;

    /// Acknowledge an entry so it leaves the group's pending list.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> RouterResult<()>;

    /// Reachability probe.
    async fn ping(&self) -> RouterResult<()>;
}

//! Broker wire messages.
//!
//! Both message kinds travel as JSON in the `body` field of a stream entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sortie_domain::MissionStatus;
use std::fmt;

/// Order published once per mission (again only by the outbox relay).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderMessage {
    /// Mission identifier
    pub mission_id: String,
    /// Opaque payload
    pub payload: Value,
    /// Publish time, Unix seconds
    pub ts: i64,
}

/// Status report from a worker, signed with its current token.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEvent {
    /// Mission identifier
    pub mission_id: String,
    /// Reported status
    pub status: MissionStatus,
    /// Reporting worker
    pub soldier_id: String,
    /// Raw bearer token of the reporting worker
    pub token: String,
    /// Free-form outcome note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Event time, Unix seconds
    #[serde(default)]
    pub ts: i64,
}

impl fmt::Debug for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusEvent")
            .field("mission_id", &self.mission_id)
            .field("status", &self.status)
            .field("soldier_id", &self.soldier_id)
            .field("token", &"<redacted>")
            .field("detail", &self.detail)
            .field("ts", &self.ts)
            .finish()
    }
}

//! Dispatch intents: the outbox half of mission creation.
//!
//! An intent is written in the same atomic step as the QUEUED mission
//! record and removed once the order has been published. Any intent still
//! present after a grace period marks a mission whose publish never
//! happened, and the relay republishes it.

use crate::mission::Mission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store key prefix for dispatch intents
pub const OUTBOX_KEY_PREFIX: &str = "outbox:";

pub(crate) fn outbox_key(mission_id: &str) -> String {
    format!("{OUTBOX_KEY_PREFIX}{mission_id}")
}

/// A mission that still needs its order published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchIntent {
    /// Mission to publish
    pub mission_id: String,
    /// Target worker for direct addressing; `None` for the shared queue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Order payload
    pub payload: Value,
    /// When the intent was recorded
    pub created_at: DateTime<Utc>,
}

impl DispatchIntent {
    /// Intent for a freshly created mission
    pub fn for_mission(mission: &Mission) -> Self {
        Self {
            mission_id: mission.id.clone(),
            target: mission.target().map(str::to_string),
            payload: mission.payload.clone(),
            created_at: mission.created_at,
        }
    }
}

//! Mission record and its lifecycle state machine.
//!
//! # State Transitions
//!
//! ```text
//! QUEUED
//!   ↓ (worker picked it up)
//! IN_PROGRESS
//!   ↓ (outcome)
//! COMPLETED | FAILED
//! ```
//!
//! Status only ever moves down this graph. Skipping IN_PROGRESS is allowed
//! because the broker may deliver the terminal event first; the late
//! IN_PROGRESS event then lands on a terminal record and is ignored, so
//! `in_progress_at` stays unset. Terminal states are absorbing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Commander identity recorded when a submission does not name one
pub const DEFAULT_COMMANDER_ID: &str = "commander-1";

/// Mission lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    /// Persisted and awaiting a worker
    Queued,
    /// A worker has started executing
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl MissionStatus {
    /// COMPLETED or FAILED
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Failed)
    }

    /// Position along the lifecycle graph; both terminal states share a rank.
    pub fn rank(self) -> u8 {
        match self {
            MissionStatus::Queued => 0,
            MissionStatus::InProgress => 1,
            MissionStatus::Completed | MissionStatus::Failed => 2,
        }
    }

    /// Wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Queued => "QUEUED",
            MissionStatus::InProgress => "IN_PROGRESS",
            MissionStatus::Completed => "COMPLETED",
            MissionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(MissionStatus::Queued),
            "IN_PROGRESS" => Ok(MissionStatus::InProgress),
            "COMPLETED" => Ok(MissionStatus::Completed),
            "FAILED" => Ok(MissionStatus::Failed),
            other => Err(format!("unknown mission status: {other}")),
        }
    }
}

/// Why a status event was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No record for the mission id
    UnknownMission,
    /// Record is already COMPLETED or FAILED
    Terminal(MissionStatus),
    /// Record already has this status
    Duplicate,
    /// Event would move the status back along the graph
    Backwards,
}

/// Result of applying a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Record updated
    Applied {
        /// Status before the event
        from: MissionStatus,
        /// Status after the event
        to: MissionStatus,
    },
    /// Event dropped without changing the record
    Ignored(IgnoreReason),
}

impl TransitionOutcome {
    /// True when the record changed
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// A unit of work with a tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    /// Opaque unique identifier, immutable
    pub id: String,
    /// Opaque payload, passed through unexamined
    pub payload: Value,
    /// Current lifecycle status
    pub status: MissionStatus,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Time of the last applied change; never decreases
    pub updated_at: DateTime<Utc>,
    /// Time of the first applied IN_PROGRESS, set at most once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_at: Option<DateTime<Utc>>,
    /// Target worker identity, empty for shared-queue missions
    #[serde(default)]
    pub assigned_to: String,
    /// Issuing commander identity
    pub commander_id: String,
}

impl Mission {
    /// Fresh QUEUED mission with a random id.
    pub fn new(
        payload: Value,
        target: Option<String>,
        commander_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            status: MissionStatus::Queued,
            created_at: now,
            updated_at: now,
            in_progress_at: None,
            assigned_to: target.unwrap_or_default(),
            commander_id: commander_id
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COMMANDER_ID.to_string()),
        }
    }

    /// Target worker, if the mission was directly addressed.
    pub fn target(&self) -> Option<&str> {
        (!self.assigned_to.is_empty()).then_some(self.assigned_to.as_str())
    }

    /// Apply a status event observed at `at`.
    ///
    /// Pure state-machine step: on `Err` the record is untouched.
    pub fn apply(&mut self, to: MissionStatus, at: DateTime<Utc>) -> Result<(), IgnoreReason> {
        let from = self.status;

        if from.is_terminal() {
            return Err(IgnoreReason::Terminal(from));
        }
        if from == to {
            return Err(IgnoreReason::Duplicate);
        }
        if to.rank() < from.rank() {
            return Err(IgnoreReason::Backwards);
        }

        self.status = to;
        if to == MissionStatus::InProgress && self.in_progress_at.is_none() {
            self.in_progress_at = Some(at);
        }
        self.updated_at = self.updated_at.max(at);
        Ok(())
    }
}

/// Event time from a Unix-seconds timestamp; absent or non-positive values
/// mean "now".
pub fn resolve_event_time(ts: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if ts <= 0 {
        return now;
    }
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or(now)
}

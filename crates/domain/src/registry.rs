//! Mission registry over the key-value store.
//!
//! Records live at `mission:{id}` as JSON. Every mutation after creation
//! goes through [`MissionRegistry::apply_transition`], which performs a
//! compare-and-swap loop on the mission key so two racing events for the
//! same mission cannot lose each other's update.

use crate::error::{DomainError, DomainResult};
use crate::mission::{resolve_event_time, IgnoreReason, Mission, MissionStatus, TransitionOutcome};
use crate::outbox::{outbox_key, DispatchIntent, OUTBOX_KEY_PREFIX};
use chrono::Utc;
use serde_json::Value;
use sortie_core::KvStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store key prefix for mission records
pub const MISSION_KEY_PREFIX: &str = "mission:";

/// Upper bound on compare-and-swap retries per event
pub const MAX_CAS_ATTEMPTS: usize = 16;

fn mission_key(id: &str) -> String {
    format!("{MISSION_KEY_PREFIX}{id}")
}

/// A mission submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMission {
    /// Opaque payload; must not be null
    pub payload: Value,
    /// Worker to address directly; `None` for the shared queue
    pub target: Option<String>,
    /// Issuing commander; defaults to `commander-1`
    pub commander_id: Option<String>,
}

/// Durable mission records with atomic per-mission transitions.
#[derive(Clone)]
pub struct MissionRegistry {
    store: Arc<dyn KvStore>,
}

impl MissionRegistry {
    /// Create a registry over `store`
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Persist a new QUEUED mission together with its dispatch intent.
    ///
    /// Both keys are written in one atomic step. The caller dispatches only
    /// after this returns, so a worker can never receive an order for a
    /// mission the registry does not know.
    pub async fn create(&self, new: NewMission) -> DomainResult<Mission> {
        if new.payload.is_null() {
            return Err(DomainError::Validation("payload is required".to_string()));
        }
        let target = new
            .target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mission = Mission::new(new.payload, target, new.commander_id, Utc::now());
        let intent = DispatchIntent::for_mission(&mission);

        self.store
            .set_all(&[
                (mission_key(&mission.id), serde_json::to_string(&mission)?),
                (outbox_key(&mission.id), serde_json::to_string(&intent)?),
            ])
            .await?;

        info!(
            mission_id = %mission.id,
            target = %mission.assigned_to,
            commander_id = %mission.commander_id,
            "Mission queued"
        );
        Ok(mission)
    }

    /// Fetch a mission snapshot.
    pub async fn get(&self, mission_id: &str) -> DomainResult<Mission> {
        let raw = self
            .store
            .get(&mission_key(mission_id))
            .await?
            .ok_or_else(|| DomainError::NotFound(mission_id.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// All missions, most recently created first, optionally restricted to
    /// one commander. Materialized fresh on every call.
    pub async fn list(&self, commander_filter: Option<&str>) -> DomainResult<Vec<Mission>> {
        let commander_filter = commander_filter.filter(|c| !c.is_empty());
        let mut missions = Vec::new();

        for key in self.store.scan_prefix(MISSION_KEY_PREFIX).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let mission: Mission = match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping undecodable mission record");
                    continue;
                }
            };
            if commander_filter.is_some_and(|c| mission.commander_id != c) {
                continue;
            }
            missions.push(mission);
        }

        missions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(missions)
    }

    /// Apply a validated status event.
    ///
    /// Unknown missions, terminal records, duplicates and backwards moves
    /// are ignored rather than reported as errors. `event_ts` is Unix
    /// seconds; non-positive means "now".
    pub async fn apply_transition(
        &self,
        mission_id: &str,
        status: MissionStatus,
        event_ts: i64,
    ) -> DomainResult<TransitionOutcome> {
        let key = mission_key(mission_id);
        let at = resolve_event_time(event_ts, Utc::now());

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(current) = self.store.get(&key).await? else {
                info!(mission_id = %mission_id, status = %status, "Status for unknown mission ignored");
                return Ok(TransitionOutcome::Ignored(IgnoreReason::UnknownMission));
            };

            let mut mission: Mission = serde_json::from_str(&current)?;
            let from = mission.status;

            if let Err(reason) = mission.apply(status, at) {
                debug!(
                    mission_id = %mission_id,
                    current = %from,
                    incoming = %status,
                    reason = ?reason,
                    "Status event ignored"
                );
                return Ok(TransitionOutcome::Ignored(reason));
            }

            let updated = serde_json::to_string(&mission)?;
            if self.store.compare_and_swap(&key, &current, &updated).await? {
                return Ok(TransitionOutcome::Applied { from, to: status });
            }

            debug!(mission_id = %mission_id, attempt, "Concurrent update, retrying transition");
        }

        Err(DomainError::Contention {
            mission_id: mission_id.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Dispatch intents not yet cleared, oldest first.
    pub async fn pending_intents(&self) -> DomainResult<Vec<DispatchIntent>> {
        let mut intents = Vec::new();
        for key in self.store.scan_prefix(OUTBOX_KEY_PREFIX).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<DispatchIntent>(&raw) {
                Ok(intent) => intents.push(intent),
                Err(e) => warn!(key = %key, error = %e, "Skipping undecodable dispatch intent"),
            }
        }
        intents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(intents)
    }

    /// Mark a mission's order as published.
    pub async fn clear_intent(&self, mission_id: &str) -> DomainResult<()> {
        self.store.delete(&outbox_key(mission_id)).await?;
        Ok(())
    }
}

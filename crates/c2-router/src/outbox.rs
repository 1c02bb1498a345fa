//! Outbox relay: republishes orders whose publish never completed.
//!
//! Mission creation leaves a dispatch intent next to the mission record.
//! The normal path publishes and clears it straight away. An intent that
//! outlives the grace period belongs to a mission whose publish failed or
//! whose commander crashed in between, and the relay publishes it again.
//! A crash between publish and clear can produce a second order, which
//! the worker side tolerates (status application is idempotent).

use crate::dispatcher::DispatchRouter;
use crate::error::RouterResult;
use chrono::Utc;
use sortie_domain::{DispatchIntent, MissionRegistry};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Default age before an intent counts as stuck
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Periodic republisher of stuck dispatch intents
#[derive(Clone)]
pub struct OutboxRelay {
    registry: MissionRegistry,
    router: DispatchRouter,
    interval: Duration,
    grace: Duration,
}

impl OutboxRelay {
    /// Create a relay sweeping every `interval`, republishing intents older
    /// than `grace`.
    pub fn new(
        registry: MissionRegistry,
        router: DispatchRouter,
        interval: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            registry,
            router,
            interval,
            grace,
        }
    }

    /// Publish one intent and clear it.
    pub async fn publish(&self, intent: &DispatchIntent) -> RouterResult<()> {
        self.router
            .dispatch(&intent.mission_id, &intent.payload, intent.target.as_deref())
            .await?;
        self.registry.clear_intent(&intent.mission_id).await?;
        Ok(())
    }

    /// One pass over pending intents. Returns how many were republished.
    pub async fn sweep(&self) -> RouterResult<usize> {
        let now = Utc::now();
        let mut republished = 0;

        for intent in self.registry.pending_intents().await? {
            let age = (now - intent.created_at).to_std().unwrap_or_default();
            if age < self.grace {
                continue;
            }
            match self.publish(&intent).await {
                Ok(()) => {
                    republished += 1;
                    info!(mission_id = %intent.mission_id, "Republished stuck order");
                }
                Err(e) => {
                    warn!(mission_id = %intent.mission_id, error = %e, "Outbox republish failed");
                }
            }
        }

        Ok(republished)
    }

    /// Sweep on a fixed interval forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            grace_secs = self.grace.as_secs(),
            "Outbox relay started"
        );

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(0) => debug!("Outbox sweep found nothing to republish"),
                Ok(n) => info!(count = n, "Outbox sweep republished orders"),
                Err(e) => warn!(error = %e, "Outbox sweep failed"),
            }
        }
    }
}

//! Mission execution.
//!
//! Payloads are opaque, so execution is simulated: a random duration in a
//! configured range, then success with a configured probability.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sortie_c2_router::OrderMessage;
use sortie_domain::MissionStatus;
use std::sync::Mutex;
use std::time::Duration;

/// Duration range and success probability for simulated missions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionProfile {
    /// Shortest run, in units
    pub min_units: u64,
    /// Longest run, in units (inclusive)
    pub max_units: u64,
    /// Length of one unit
    pub unit: Duration,
    /// Probability of COMPLETED
    pub success_rate: f64,
}

impl Default for ExecutionProfile {
    fn default() -> Self {
        Self {
            min_units: 5,
            max_units: 15,
            unit: Duration::from_secs(1),
            success_rate: 0.9,
        }
    }
}

impl ExecutionProfile {
    /// Order the bounds and clamp the rate into `[0, 1]`.
    pub fn normalized(mut self) -> Self {
        if self.max_units < self.min_units {
            std::mem::swap(&mut self.min_units, &mut self.max_units);
        }
        self.success_rate = if self.success_rate.is_nan() {
            0.0
        } else {
            self.success_rate.clamp(0.0, 1.0)
        };
        self
    }
}

/// Terminal result of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// COMPLETED or FAILED
    pub status: MissionStatus,
    /// Time spent executing
    pub elapsed: Duration,
}

#[async_trait]
pub trait MissionExecutor: Send + Sync {
    /// Run one order to completion.
    async fn execute(&self, order: &OrderMessage) -> Execution;
}

/// Sleeps for a random duration and picks the outcome at random.
pub struct SimulatedExecutor {
    profile: ExecutionProfile,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(profile: ExecutionProfile) -> Self {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    /// Deterministic draws, for tests.
    pub fn seeded(profile: ExecutionProfile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profile: ExecutionProfile, rng: StdRng) -> Self {
        Self {
            profile: profile.normalized(),
            rng: Mutex::new(rng),
        }
    }

    /// Draw a duration and an outcome without sleeping.
    pub fn plan(&self) -> Execution {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let units = rng.gen_range(self.profile.min_units..=self.profile.max_units);
        let status = if rng.gen_bool(self.profile.success_rate) {
            MissionStatus::Completed
        } else {
            MissionStatus::Failed
        };
        Execution {
            status,
            elapsed: scaled(self.profile.unit, units),
        }
    }
}

/// `unit * units`, saturating at `u64::MAX` nanoseconds.
fn scaled(unit: Duration, units: u64) -> Duration {
    let nanos = unit.as_nanos().saturating_mul(u128::from(units));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[async_trait]
impl MissionExecutor for SimulatedExecutor {
    async fn execute(&self, _order: &OrderMessage) -> Execution {
        let planned = self.plan();
        tokio::time::sleep(planned.elapsed).await;
        planned
    }
}

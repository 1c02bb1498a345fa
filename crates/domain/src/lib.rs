//! Sortie mission domain.
//!
//! Mission records, the forward-only lifecycle state machine, and the
//! registry that persists missions and applies status events atomically.

pub mod error;
pub mod mission;
pub mod outbox;
pub mod registry;

pub use error::{DomainError, DomainResult};
pub use mission::{
    resolve_event_time, IgnoreReason, Mission, MissionStatus, TransitionOutcome,
    DEFAULT_COMMANDER_ID,
};
pub use outbox::{DispatchIntent, OUTBOX_KEY_PREFIX};
pub use registry::{MissionRegistry, NewMission, MAX_CAS_ATTEMPTS, MISSION_KEY_PREFIX};

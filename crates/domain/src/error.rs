//! Domain errors

use sortie_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Mission not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Mission {mission_id} still contended after {attempts} compare-and-swap attempts")]
    Contention { mission_id: String, attempts: usize },

    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DomainResult<T> = std::result::Result<T, DomainError>;

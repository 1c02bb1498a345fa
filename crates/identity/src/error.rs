//! Error types for Sortie token authority operations.

use sortie_core::CoreError;
use thiserror::Error;

/// Errors that can occur while issuing or listing credentials.
///
/// Validation never produces an error; it fails closed to `false`.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A required request field was empty
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Bootstrap secret did not verify
    #[error("Invalid bootstrap secret")]
    InvalidSecret,

    /// Password hashing failed (bad parameters or PHC string)
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Token store unreachable
    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

//! HTTP error mapping

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sortie_domain::DomainError;
use sortie_identity::IdentityError;
use thiserror::Error;
use tracing::error;

/// Realm advertised on admin authentication challenges
pub const ADMIN_REALM: &str = "sortie-admin";

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or missing field
    #[error("{0}")]
    BadRequest(&'static str),

    /// Bootstrap secret did not verify
    #[error("invalid secret")]
    InvalidSecret,

    /// Admin credentials missing or wrong
    #[error("unauthorized")]
    AdminAuth,

    /// Unknown mission
    #[error("mission not found")]
    NotFound,

    /// Mission persisted but its order could not be published yet
    #[error("failed to publish mission {mission_id}")]
    PublishFailed {
        /// Mission that the outbox relay will retry
        mission_id: String,
    },

    /// Store or other dependency failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidSecret | ApiError::AdminAuth => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PublishFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(_) => ApiError::NotFound,
            DomainError::Validation(_) => ApiError::BadRequest("payload is required"),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingField(_) => ApiError::BadRequest("missing fields"),
            IdentityError::InvalidSecret => ApiError::InvalidSecret,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::AdminAuth => (
                status,
                [(
                    header::WWW_AUTHENTICATE,
                    format!("Basic realm=\"{ADMIN_REALM}\""),
                )],
                Json(json!({"error": "unauthorized"})),
            )
                .into_response(),
            ApiError::PublishFailed { mission_id } => (
                status,
                Json(json!({
                    "error": "failed to publish mission",
                    "mission_id": mission_id,
                })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                // Details stay in the log
                error!(error = %detail, "Request failed");
                (status, Json(json!({"error": "internal error"}))).into_response()
            }
            other => (status, Json(json!({"error": other.to_string()}))).into_response(),
        }
    }
}

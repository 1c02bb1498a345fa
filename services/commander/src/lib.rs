//! Sortie commander: mission API, status ingestion and outbox relay.
//!
//! The HTTP surface accepts missions, serves their state, issues worker
//! tokens and exposes an admin credential view. Two background tasks share
//! the same registry: the [`ingestor::StatusIngestor`] applying worker
//! status events, and the outbox relay republishing stuck orders.

pub mod admin;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingestor;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use config::Config;
pub use error::ApiError;
pub use ingestor::{IngestOutcome, StatusIngestor};
pub use state::AppState;

/// Build the HTTP router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/missions",
            post(handlers::create_mission).get(handlers::list_missions),
        )
        .route("/missions/:id", get(handlers::get_mission))
        .route("/token/issue", post(handlers::issue_token))
        .route("/admin/tokens", get(handlers::list_tokens))
        .with_state(state)
}

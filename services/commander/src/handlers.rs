use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sortie_domain::{DispatchIntent, Mission, NewMission};
use sortie_identity::{CredentialSummary, IssuedToken};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMissionRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub commander_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMissionsQuery {
    pub commander_id: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenIssueRequest {
    #[serde(default)]
    pub soldier_id: String,
    #[serde(default)]
    pub secret: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({"message": "Commander API is running"}))
}

pub async fn create_mission(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateMissionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid JSON"))?;
    let payload = req
        .payload
        .filter(|p| !p.is_null())
        .ok_or(ApiError::BadRequest("payload is required"))?;

    let mission = state
        .registry
        .create(NewMission {
            payload,
            target: req.target,
            commander_id: req.commander_id,
        })
        .await?;

    // Persisted before publish; a failure here leaves the intent for the relay
    if let Err(e) = state.relay.publish(&DispatchIntent::for_mission(&mission)).await {
        error!(mission_id = %mission.id, error = %e, "Failed to publish mission");
        return Err(ApiError::PublishFailed {
            mission_id: mission.id,
        });
    }

    Ok(Json(json!({"mission_id": mission.id})))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Mission>, ApiError> {
    Ok(Json(state.registry.get(&id).await?))
}

pub async fn list_missions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMissionsQuery>,
) -> Result<Json<Vec<Mission>>, ApiError> {
    let missions = state.registry.list(query.commander_id.as_deref()).await?;
    Ok(Json(missions))
}

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TokenIssueRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid body"))?;
    let issued = state.authority.issue(&req.soldier_id, &req.secret).await?;
    info!(soldier_id = %req.soldier_id, "Token issued over HTTP");
    Ok(Json(issued))
}

pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CredentialSummary>>, ApiError> {
    state.admin.authorize(&headers)?;
    Ok(Json(state.authority.list_credentials().await?))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let redis = state.store.ping().await.is_ok();
    let broker = state.broker.ping().await.is_ok();
    let status = if redis && broker { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "redis": redis,
        "broker": broker,
    }))
}

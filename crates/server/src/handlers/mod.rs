//! HTTP request handlers.

pub mod auth;
pub mod downloads;
pub mod drive;
pub mod uploads;

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

/// GET /healthz - liveness probe (intentionally unauthenticated).
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.metadata.health_check().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

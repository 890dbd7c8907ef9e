//! API handlers. Each one is a thin adapter over [`ControlPlane`](crate::control_plane::ControlPlane).

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::alerts::CreateAlertRequest;
use crate::http::response::{apply_status, ApiError};
use crate::http::server::AppState;
use crate::orchestrator::ApplyRequest;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollbackRequest {
    pub version_id: Option<String>,
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.plane.status().await)
}

pub async fn get_targets(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let targets = state.plane.targets().await.map_err(ApiError::upstream)?;
    Ok(Json(json!({ "targets": targets })))
}

pub async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.plane.current_config().await?))
}

pub async fn validate_config(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.plane.validate(&request).await?))
}

pub async fn apply_config(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.plane.apply(&request).await?;
    Ok((apply_status(&outcome), Json(outcome)))
}

/// The body is optional; an empty body rolls back to the last good version.
pub async fn rollback_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RollbackRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RollbackRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid rollback request: {}", e)))?
    };

    let outcome = state.plane.rollback(request.version_id.as_deref()).await?;
    Ok(Json(outcome))
}

pub async fn version_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let versions = state.plane.history().await?;
    Ok(Json(json!({ "versions": versions })))
}

pub async fn list_alerts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.plane.alerts().await?))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.plane.create_alert(&request).await?;
    let mut status = apply_status(&outcome.apply);
    if status == StatusCode::OK {
        status = StatusCode::CREATED;
    }
    Ok((status, Json(outcome)))
}

pub async fn raw_rules(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.plane.raw_rules().await?))
}

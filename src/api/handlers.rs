//! Session request handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::types::{
    LegacyStartResponse, LegacyStepRequest, LegacyStepResponse, SessionList, StartRequest,
    StepRequest,
};
use super::{AppState, json_body};
use crate::error::{ServiceError, ServiceResult};
use crate::session::{SessionStatus, StepOutcome};

/// `GET /` → plain-text banner
pub async fn index() -> &'static str {
    "Co-simulation session API (multi-user ready)"
}

/// `GET /health` → `{"status": "ok"}`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Starts a session on the requested (or default) profile.
///
/// `POST /sessions` → 201 + `SessionStatus` JSON
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ServiceResult<(StatusCode, Json<SessionStatus>)> {
    let req: StartRequest = json_body(&body)?;
    let status = state.sessions.start(req.profile.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// Steps a session once.
///
/// `POST /sessions/{id}/step` → 200 + `StepOutcome` JSON
/// `POST /sessions/{unknown}/step` → 404 + `ErrorResponse`
pub async fn step_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ServiceResult<Json<StepOutcome>> {
    let req: StepRequest = json_body(&body)?;
    Ok(Json(state.sessions.step(&id, req.input_value).await?))
}

/// `GET /sessions/{id}` → 200 + `SessionStatus` JSON
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<SessionStatus>> {
    Ok(Json(state.sessions.status(&id).await?))
}

/// Releases a session before it is done.
///
/// `DELETE /sessions/{id}` → 200 + final `SessionStatus` JSON
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<SessionStatus>> {
    Ok(Json(state.sessions.stop(&id).await?))
}

/// `GET /sessions` → 200 + `SessionList` JSON
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionList> {
    Json(SessionList {
        sessions: state.sessions.list(),
    })
}

/// `POST /start-simulation` → `{"message": .., "session_id": ..}` on the default profile
pub async fn legacy_start(
    State(state): State<Arc<AppState>>,
) -> ServiceResult<Json<LegacyStartResponse>> {
    let status = state.sessions.start(None).await?;
    Ok(Json(LegacyStartResponse {
        message: "Simulation started successfully!",
        session_id: status.session_id,
    }))
}

/// `POST /step-simulation` with `{"session_id", "input_value"}` → flat step result
pub async fn legacy_step(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ServiceResult<Json<LegacyStepResponse>> {
    let req: LegacyStepRequest = json_body(&body)?;
    let id = req
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("missing session_id".into()))?;
    let outcome = state.sessions.step(&id, req.input_value).await?;
    Ok(Json(LegacyStepResponse::from(outcome)))
}

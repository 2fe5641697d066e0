//! Real-time runner handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use super::AppState;
use super::types::{RealtimeStatus, UpdateRequest};
use crate::error::{ServiceError, ServiceResult};
use crate::realtime::TraceSnapshot;

/// `POST /realtime/start` → `{"status": "simulation started"}`; 409 if already running
pub async fn start(State(state): State<Arc<AppState>>) -> ServiceResult<Json<RealtimeStatus>> {
    state.realtime.start().await?;
    Ok(Json(RealtimeStatus {
        status: "simulation started",
        new_value: None,
    }))
}

/// `POST /realtime/update` with `{"value": f64}` → `{"status": "updated", "new_value": ..}`
pub async fn update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ServiceResult<Json<RealtimeStatus>> {
    let req: UpdateRequest = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("expected {{\"value\": number}}: {e}")))?;
    state.realtime.update(req.value)?;
    Ok(Json(RealtimeStatus {
        status: "updated",
        new_value: Some(req.value),
    }))
}

/// `GET /realtime/data` → latest `TraceSnapshot`; empty series before the first step
pub async fn data(State(state): State<Arc<AppState>>) -> Json<TraceSnapshot> {
    Json(state.realtime.data())
}

/// `POST /realtime/stop` → final `TraceSnapshot`; 409 if not running
pub async fn stop(State(state): State<Arc<AppState>>) -> ServiceResult<Json<TraceSnapshot>> {
    Ok(Json(state.realtime.stop().await?))
}

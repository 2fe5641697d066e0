//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::util::ServiceExt;

use cosim_server::api::{AppState, router};
use cosim_server::config::ServiceConfig;
use cosim_server::model::BuiltinRuntime;

/// Artifacts shipped with the crate.
pub fn artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

/// Default configuration over the shipped artifacts, extracting into a
/// fresh temp dir that the caller keeps alive.
pub fn default_config() -> (TempDir, ServiceConfig) {
    let work = TempDir::new().expect("work dir");
    let mut config = ServiceConfig::default();
    config.artifacts.dir = artifacts_dir();
    config.artifacts.work_dir = Some(work.path().to_path_buf());
    (work, config)
}

pub fn state(config: ServiceConfig) -> Arc<AppState> {
    Arc::new(AppState::new(config, Arc::new(BuiltinRuntime)))
}

/// Number of entries in the extraction directory.
pub fn extractions(work: &TempDir) -> usize {
    std::fs::read_dir(work.path()).map(|d| d.count()).unwrap_or(0)
}

/// Sends one request through a fresh router and returns status and body.
pub async fn send(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

/// Like [`send`], decoding the body as JSON.
pub async fn send_json(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(state, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

//! REST API over sessions, artifacts, the real-time runner and the calculators.
//!
//! All JSON errors share the `{"error": "..."}` body; see [`error::status_of`]
//! for the status codes.

mod calc;
pub mod error;
mod handlers;
mod models;
mod realtime;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{ArtifactStore, Runtime};
use crate::realtime::RealtimeController;
use crate::session::SessionRegistry;

/// Application state shared across all request handlers.
///
/// Built once at startup and wrapped in `Arc`; the session registry and
/// the real-time controller synchronize internally.
pub struct AppState {
    /// Configuration the service was started with.
    pub config: ServiceConfig,
    /// Artifact lookup and extraction.
    pub store: Arc<ArtifactStore>,
    /// Runtime instantiating simulation handles.
    pub runtime: Arc<dyn Runtime>,
    /// Live stepped sessions.
    pub sessions: SessionRegistry,
    /// Background real-time runner.
    pub realtime: RealtimeController,
}

impl AppState {
    /// Wires the store, registry and runner from `config`.
    pub fn new(config: ServiceConfig, runtime: Arc<dyn Runtime>) -> Self {
        let mut store = ArtifactStore::new(&config.artifacts.dir);
        if let Some(work) = &config.artifacts.work_dir {
            store = store.with_work_dir(work);
        }
        let store = Arc::new(store);
        let sessions = SessionRegistry::new(
            Arc::clone(&store),
            Arc::clone(&runtime),
            config.session.clone(),
            config.server.max_sessions,
        );
        let realtime = RealtimeController::new(
            Arc::clone(&store),
            Arc::clone(&runtime),
            config.realtime.clone(),
        );
        Self {
            config,
            store,
            runtime,
            sessions,
            realtime,
        }
    }

    /// Stops the runner and releases every session.
    pub async fn shutdown(&self) {
        self.realtime.shutdown().await;
        self.sessions.clear().await;
    }
}

/// Parses an optional JSON body; an empty body yields `T::default()`.
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> ServiceResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::InvalidInput(format!("invalid JSON body: {e}")))
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::start_session),
        )
        .route(
            "/sessions/{id}",
            get(handlers::session_status).delete(handlers::stop_session),
        )
        .route("/sessions/{id}/step", post(handlers::step_session))
        .route("/start-simulation", post(handlers::legacy_start))
        .route("/step-simulation", post(handlers::legacy_step))
        .route("/models", get(models::list_models))
        .route("/models/{name}", get(models::describe_model))
        .route("/models/{name}/dump", get(models::dump_model))
        .route("/models/{name}/variables", get(models::model_variables))
        .route("/models/{name}/simulate", post(models::simulate_model))
        .route("/realtime/start", post(realtime::start))
        .route("/realtime/update", post(realtime::update))
        .route("/realtime/data", get(realtime::data))
        .route("/realtime/stop", post(realtime::stop))
        .route("/calc/lcoh", get(calc::lcoh))
        .route("/calc/nh3-balance", get(calc::nh3_balance))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds to the given address and serves the API until Ctrl-C.
///
/// Sessions and the real-time runner are released after the listener
/// has drained.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.shutdown().await;
    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::BuiltinRuntime;
    use crate::session::tests::FIRST_ORDER;
    use crate::config::SessionProfile;
    use std::fs;
    use tempfile::TempDir;

    /// Temp dirs backing a test state; dropped with the state.
    pub(crate) struct TestDirs {
        pub artifacts: TempDir,
        pub work: TempDir,
    }

    /// State over a store holding only `FirstOrder`, with a `lag` profile
    /// stepping 0.1 s up to `stop_time`.
    pub(crate) fn make_test_state(stop_time: f64) -> (TestDirs, Arc<AppState>) {
        let artifacts = TempDir::new().expect("artifact dir");
        let work = TempDir::new().expect("work dir");
        fs::write(artifacts.path().join("FirstOrder.model.toml"), FIRST_ORDER).expect("write");

        let mut config = ServiceConfig::default();
        config.artifacts.dir = artifacts.path().to_path_buf();
        config.artifacts.work_dir = Some(work.path().to_path_buf());
        config.session.profiles.insert(
            "lag".to_string(),
            SessionProfile {
                artifact: "FirstOrder".to_string(),
                input: "u".to_string(),
                outputs: vec!["x".to_string()],
                step_size: 0.1,
                stop_time,
                threshold: None,
            },
        );
        config.session.default_profile = "lag".to_string();
        config.realtime.artifact = "FirstOrder".to_string();
        config.realtime.input = Some("u".to_string());
        config.realtime.step_size = 0.01;
        config.realtime.speedup = 100.0;
        config.realtime.publish_every = 1;

        let state = Arc::new(AppState::new(config, Arc::new(BuiltinRuntime)));
        (TestDirs { artifacts, work }, state)
    }

    #[test]
    fn empty_body_yields_default() {
        let parsed: types::StepRequest = json_body(&Bytes::new()).expect("empty ok");
        assert_eq!(parsed.input_value, 0.0);
        let parsed: types::StepRequest =
            json_body(&Bytes::from_static(b"{\"input_value\": 2.5}")).expect("parses");
        assert_eq!(parsed.input_value, 2.5);
        assert!(matches!(
            json_body::<types::StepRequest>(&Bytes::from_static(b"{oops")),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}

//! Artifact inspection and batch simulation handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::types::{ModelList, SimulateQuery, VariableList};
use super::{AppState, json_body};
use crate::error::{ServiceError, ServiceResult};
use crate::io::export::write_csv;
use crate::model::ModelDescription;
use crate::sim::batch::{self, BatchOptions};

fn describe(state: &AppState, name: &str) -> ServiceResult<ModelDescription> {
    if !crate::model::ArtifactStore::is_valid_name(name) {
        return Err(ServiceError::InvalidInput(format!(
            "invalid artifact name \"{name}\""
        )));
    }
    if !state.store.contains(name) {
        return Err(ServiceError::ArtifactNotFound(name.to_string()));
    }
    Ok(state.store.describe(name)?)
}

/// `GET /models` → 200 + `ModelList` JSON
pub async fn list_models(State(state): State<Arc<AppState>>) -> ServiceResult<Json<ModelList>> {
    Ok(Json(ModelList {
        models: state.store.list()?,
    }))
}

/// `GET /models/{name}` → 200 + `ModelDescription` JSON
pub async fn describe_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServiceResult<Json<ModelDescription>> {
    Ok(Json(describe(&state, &name)?))
}

/// `GET /models/{name}/dump` → 200 + plain-text model report
pub async fn dump_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServiceResult<String> {
    Ok(describe(&state, &name)?.dump())
}

/// `GET /models/{name}/variables` → 200 + `VariableList` JSON
pub async fn model_variables(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServiceResult<Json<VariableList>> {
    let description = describe(&state, &name)?;
    Ok(Json(VariableList {
        variables: description.variable_names(),
        model_name: description.model_name,
    }))
}

/// Runs the artifact from start to stop on a blocking thread.
///
/// `POST /models/{name}/simulate` → 200 + `SimulationResult` JSON
/// `POST /models/{name}/simulate?format=csv` → 200 + CSV
pub async fn simulate_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<SimulateQuery>,
    body: Bytes,
) -> ServiceResult<Response> {
    let options: BatchOptions = json_body(&body)?;
    let csv = match query.format.as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(ServiceError::InvalidInput(format!(
                "unsupported format \"{other}\""
            )));
        }
    };

    let store = Arc::clone(&state.store);
    let runtime = Arc::clone(&state.runtime);
    let result = tokio::task::spawn_blocking(move || {
        batch::simulate(&store, runtime.as_ref(), &name, &options)
    })
    .await??;

    if csv {
        let mut buf = Vec::new();
        write_csv(&result, &mut buf)?;
        Ok(([(header::CONTENT_TYPE, "text/csv")], buf).into_response())
    } else {
        Ok(Json(result).into_response())
    }
}

//! Execution submit / poll / cancel handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use engine::models::Execution;

use super::{engine_error, storage_error, ApiError};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct ExecuteWorkflowRequest {
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

/// Submit an execution; responds immediately with the execution id while
/// the run proceeds in the background.
pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<ExecuteWorkflowRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let execution_id = state
        .executor
        .submit(id, request.input, request.use_cache)
        .await
        .map_err(engine_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "execution_id": execution_id,
            "workflow_id": id,
            "status": "pending",
        })),
    ))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state.executor.status(id).await.map_err(engine_error)?;
    Ok(Json(execution))
}

pub async fn list(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Execution>>, ApiError> {
    let executions = state
        .storage
        .list_executions(workflow_id)
        .await
        .map_err(storage_error)?;
    Ok(Json(executions))
}

pub async fn cancel(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.executor.cancel(id).await.map_err(engine_error)?;
    Ok(StatusCode::ACCEPTED)
}

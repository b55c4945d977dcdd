//! Node catalogue, preview, and cache statistics.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use engine::models::NodeResult;
use nodes::NodeKindInfo;

use super::{engine_error, ApiError};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct PreviewNodeRequest {
    pub kind: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// All registered node kinds with their schemas, in registration order.
pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let kinds: Vec<NodeKindInfo> = state.registry.list().iter().map(NodeKindInfo::from).collect();
    Json(json!({
        "node_kinds": kinds,
        "categories": state.registry.categories(),
    }))
}

/// Run one node in isolation, bypassing persistence and the cache.
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewNodeRequest>,
) -> Result<Json<NodeResult>, ApiError> {
    let result = state
        .executor
        .preview_node(
            &request.kind,
            &request.config,
            &request.inputs,
            &request.context,
        )
        .await
        .map_err(engine_error)?;

    Ok(Json(result))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.executor.cache_stats()))
}

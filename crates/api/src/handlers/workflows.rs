//! Workflow CRUD handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use engine::models::{Edge, NodeDefinition, Workflow};

use super::{engine_error, storage_error, ApiError};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(serde::Deserialize)]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<NodeDefinition>>,
    #[serde(default)]
    pub edges: Option<Vec<Edge>>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Workflow>>, ApiError> {
    let workflows = state.storage.list_workflows().await.map_err(storage_error)?;
    Ok(Json(workflows))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.storage.get_workflow(id).await.map_err(storage_error)?;
    Ok(Json(workflow))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let mut workflow = Workflow::new(request.name, request.nodes, request.edges);
    workflow.description = request.description;

    engine::validate(&workflow, &state.registry)
        .map_err(|err| engine_error(err.into()))?;

    state
        .storage
        .create_workflow(&workflow)
        .await
        .map_err(storage_error)?;

    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<UpdateWorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    let mut workflow = state.storage.get_workflow(id).await.map_err(storage_error)?;

    if let Some(name) = request.name {
        workflow.name = name;
    }
    if let Some(description) = request.description {
        workflow.description = Some(description);
    }
    if let Some(nodes) = request.nodes {
        workflow.nodes = nodes;
    }
    if let Some(edges) = request.edges {
        workflow.edges = edges;
    }
    workflow.version += 1;
    workflow.updated_at = Utc::now();

    engine::validate(&workflow, &state.registry)
        .map_err(|err| engine_error(err.into()))?;

    state
        .storage
        .update_workflow(id, &workflow)
        .await
        .map_err(storage_error)?;

    Ok(Json(workflow))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete_workflow(id).await.map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//! Request handlers, grouped by resource.

pub mod executions;
pub mod nodes;
pub mod workflows;

use axum::http::StatusCode;

use engine::{EngineError, StorageError};

pub(crate) type ApiError = (StatusCode, String);

pub(crate) fn storage_error(err: StorageError) -> ApiError {
    let status = match &err {
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::VersionConflict { .. } => StatusCode::CONFLICT,
        StorageError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub(crate) fn engine_error(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::InvalidGraph(_) => StatusCode::BAD_REQUEST,
        EngineError::UnknownWorkflow(_) | EngineError::UnknownExecution(_) => {
            StatusCode::NOT_FOUND
        }
        EngineError::Registry(::nodes::RegistryError::UnknownKind(_)) => StatusCode::NOT_FOUND,
        EngineError::Registry(_) => StatusCode::BAD_REQUEST,
        EngineError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

//! The storage interface consumed by the engine.
//!
//! The engine owns the trait; backends (in-memory, Postgres) live in the
//! `storage` crate and are injected behind an `Arc<dyn Storage>`.  Each
//! call is an atomic unit — the engine makes no assumptions about
//! atomicity across calls.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Execution, Workflow};

/// Domain errors a storage backend may return.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,

    /// An update carried a version that isn't newer than the stored one.
    #[error("version conflict: stored version {stored}, proposed {proposed}")]
    VersionConflict { stored: u32, proposed: u32 },

    /// Backend-specific failure (connection loss, constraint violation, …).
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// CRUD for workflow definitions and execution records.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<Uuid, StorageError>;
    async fn get_workflow(&self, id: Uuid) -> Result<Workflow, StorageError>;
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError>;
    async fn update_workflow(&self, id: Uuid, workflow: &Workflow) -> Result<(), StorageError>;
    async fn delete_workflow(&self, id: Uuid) -> Result<(), StorageError>;

    async fn create_execution(&self, execution: &Execution) -> Result<Uuid, StorageError>;
    async fn update_execution(&self, id: Uuid, execution: &Execution) -> Result<(), StorageError>;
    async fn get_execution(&self, id: Uuid) -> Result<Execution, StorageError>;
    async fn list_executions(&self, workflow_id: Uuid) -> Result<Vec<Execution>, StorageError>;
}

//! Postgres storage backend.
//!
//! Rows carry the full domain record as a JSONB `definition`/`record`
//! column plus the columns worth indexing on (version, status, times).
//! Queries are runtime-checked so the workspace builds without a live
//! database; the schema lives in `migrations/` at the workspace root.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use engine::models::{Execution, Workflow};
use engine::storage::{Storage, StorageError};

/// Create a connection pool for the given `database_url`.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StorageError> {
    info!(max_connections, "connecting to database");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(StorageError::backend)
}

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

#[derive(FromRow)]
struct DefinitionRow {
    definition: serde_json::Value,
}

#[derive(FromRow)]
struct RecordRow {
    record: serde_json::Value,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        info!("running database migrations");
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::backend)
    }

    fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, StorageError> {
        serde_json::from_value(value).map_err(StorageError::backend)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<Uuid, StorageError> {
        let definition = serde_json::to_value(workflow).map_err(StorageError::backend)?;
        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, version, definition, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(workflow.version as i32)
        .bind(definition)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        Ok(workflow.id)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Workflow, StorageError> {
        let row = sqlx::query_as::<_, DefinitionRow>(
            "SELECT definition FROM workflows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::backend)?
        .ok_or(StorageError::NotFound)?;

        Self::decode(row.definition)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
        let rows = sqlx::query_as::<_, DefinitionRow>(
            "SELECT definition FROM workflows ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        rows.into_iter().map(|r| Self::decode(r.definition)).collect()
    }

    async fn update_workflow(&self, id: Uuid, workflow: &Workflow) -> Result<(), StorageError> {
        let definition = serde_json::to_value(workflow).map_err(StorageError::backend)?;
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = $2, version = $3, definition = $4, updated_at = $5
            WHERE id = $1 AND version < $3
            "#,
        )
        .bind(id)
        .bind(&workflow.name)
        .bind(workflow.version as i32)
        .bind(definition)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing updated: either the row is missing or the version guard
        // failed; a follow-up read tells the two apart.
        let stored = sqlx::query("SELECT version FROM workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::backend)?
            .ok_or(StorageError::NotFound)?;
        let stored_version: i32 = stored.try_get("version").map_err(StorageError::backend)?;

        Err(StorageError::VersionConflict {
            stored: stored_version as u32,
            proposed: workflow.version,
        })
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn create_execution(&self, execution: &Execution) -> Result<Uuid, StorageError> {
        let record = serde_json::to_value(execution).map_err(StorageError::backend)?;
        sqlx::query(
            r#"
            INSERT INTO executions (id, workflow_id, status, record, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(execution.id)
        .bind(execution.workflow_id)
        .bind(execution.status.to_string())
        .bind(record)
        .bind(execution.created_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        Ok(execution.id)
    }

    async fn update_execution(&self, id: Uuid, execution: &Execution) -> Result<(), StorageError> {
        let record = serde_json::to_value(execution).map_err(StorageError::backend)?;
        let result = sqlx::query(
            "UPDATE executions SET status = $2, record = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(execution.status.to_string())
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Execution, StorageError> {
        let row = sqlx::query_as::<_, RecordRow>("SELECT record FROM executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::backend)?
            .ok_or(StorageError::NotFound)?;

        Self::decode(row.record)
    }

    async fn list_executions(&self, workflow_id: Uuid) -> Result<Vec<Execution>, StorageError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT record FROM executions WHERE workflow_id = $1 ORDER BY created_at DESC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        rows.into_iter().map(|r| Self::decode(r.record)).collect()
    }
}

//! In-memory storage backend.
//!
//! The default backend when no `DATABASE_URL` is configured, and the one
//! engine and API tests run against. State lives for the process only —
//! which is exactly the durability the engine promises without a real
//! database behind it.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use engine::models::{Execution, Workflow};
use engine::storage::{Storage, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<Uuid, StorageError> {
        self.workflows
            .write()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(workflow.id)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Workflow, StorageError> {
        self.workflows
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
        let mut workflows: Vec<Workflow> =
            self.workflows.read().unwrap().values().cloned().collect();
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workflows)
    }

    async fn update_workflow(&self, id: Uuid, workflow: &Workflow) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write().unwrap();
        let stored = workflows.get_mut(&id).ok_or(StorageError::NotFound)?;
        if workflow.version <= stored.version {
            return Err(StorageError::VersionConflict {
                stored: stored.version,
                proposed: workflow.version,
            });
        }
        *stored = workflow.clone();
        Ok(())
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<(), StorageError> {
        self.workflows
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn create_execution(&self, execution: &Execution) -> Result<Uuid, StorageError> {
        self.executions
            .write()
            .unwrap()
            .insert(execution.id, execution.clone());
        Ok(execution.id)
    }

    async fn update_execution(&self, id: Uuid, execution: &Execution) -> Result<(), StorageError> {
        let mut executions = self.executions.write().unwrap();
        let stored = executions.get_mut(&id).ok_or(StorageError::NotFound)?;
        *stored = execution.clone();
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Execution, StorageError> {
        self.executions
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_executions(&self, workflow_id: Uuid) -> Result<Vec<Execution>, StorageError> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .unwrap()
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn workflow(name: &str) -> Workflow {
        Workflow::new(name, vec![], vec![])
    }

    #[tokio::test]
    async fn workflow_crud_roundtrip() {
        let store = MemoryStorage::new();
        let wf = workflow("crud");

        let id = store.create_workflow(&wf).await.unwrap();
        assert_eq!(store.get_workflow(id).await.unwrap().name, "crud");
        assert_eq!(store.list_workflows().await.unwrap().len(), 1);

        store.delete_workflow(id).await.unwrap();
        assert!(matches!(
            store.get_workflow(id).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_requires_a_newer_version() {
        let store = MemoryStorage::new();
        let wf = workflow("versioned");
        store.create_workflow(&wf).await.unwrap();

        // Same version: rejected.
        assert!(matches!(
            store.update_workflow(wf.id, &wf).await,
            Err(StorageError::VersionConflict { stored: 1, proposed: 1 })
        ));

        let mut bumped = wf.clone();
        bumped.version = 2;
        bumped.name = "renamed".into();
        store.update_workflow(wf.id, &bumped).await.unwrap();
        assert_eq!(store.get_workflow(wf.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn executions_are_scoped_to_their_workflow() {
        let store = MemoryStorage::new();
        let wf_a = workflow("a");
        let wf_b = workflow("b");

        let exec_a = Execution::new(wf_a.id, Map::new(), true);
        let exec_b = Execution::new(wf_b.id, Map::new(), true);
        store.create_execution(&exec_a).await.unwrap();
        store.create_execution(&exec_b).await.unwrap();

        let listed = store.list_executions(wf_a.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, exec_a.id);
    }

    #[tokio::test]
    async fn updating_a_missing_execution_is_not_found() {
        let store = MemoryStorage::new();
        let exec = Execution::new(Uuid::new_v4(), Map::new(), true);
        assert!(matches!(
            store.update_execution(exec.id, &exec).await,
            Err(StorageError::NotFound)
        ));
    }
}

//! End-to-end tests for the workflow execution engine.
//!
//! These run against a small in-test storage backend so no external
//! database is required; the `storage` crate's backends get their own
//! tests. Node behaviour comes from the built-in kinds plus `MockNode`
//! doubles for failure, latency, and non-determinism.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use nodes::mock::MockNode;
use nodes::{register_builtins, NodeDescriptor, NodeRegistry};

use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::executor::WorkflowExecutor;
use crate::graph;
use crate::models::{Edge, Execution, ExecutionStatus, NodeDefinition, Workflow};
use crate::plan::build_plan;
use crate::storage::{Storage, StorageError};
use crate::EngineError;

// ---------------------------------------------------------------------------
// In-test storage backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
}

#[async_trait]
impl Storage for MemStore {
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
        Ok(self.workflows.read().unwrap().values().cloned().collect())
    }

    async fn update_workflow(&self, id: Uuid, workflow: &Workflow) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write().unwrap();
        let stored = workflows.get_mut(&id).ok_or(StorageError::NotFound)?;
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
        Ok(self
            .executions
            .read()
            .unwrap()
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn test_registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    register_builtins(&mut registry).unwrap();
    registry
        .register(NodeDescriptor::new(
            "boom",
            "Boom",
            "Always fails fatally",
            "Test",
            Arc::new(MockNode::failing_fatal("boom", "something broke")),
        ))
        .unwrap();
    registry
        .register(NodeDescriptor::new(
            "slow",
            "Slow",
            "Sleeps before succeeding",
            "Test",
            Arc::new(MockNode::delayed(
                "slow",
                Duration::from_millis(300),
                json!("slow done"),
            )),
        ))
        .unwrap();
    registry
        .register(
            NodeDescriptor::new(
                "dice",
                "Dice",
                "Pretends to be non-deterministic",
                "Test",
                Arc::new(MockNode::returning("dice", json!(4))),
            )
            .not_cacheable(),
        )
        .unwrap();
    Arc::new(registry)
}

fn fixture(config: EngineConfig) -> (WorkflowExecutor, Arc<MemStore>) {
    let store = Arc::new(MemStore::default());
    let storage: Arc<dyn Storage> = store.clone();
    (
        WorkflowExecutor::new(storage, test_registry(), config),
        store,
    )
}

fn node(id: &str, kind: &str, config: Value) -> NodeDefinition {
    NodeDefinition {
        id: id.into(),
        kind: kind.into(),
        config,
    }
}

fn edge(source: &str, target: &str) -> Edge {
    Edge {
        source: source.into(),
        target: target.into(),
    }
}

fn inputs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Two-node pipeline: a literal "hi" into a prefixing echo.
fn linear_workflow() -> Workflow {
    Workflow::new(
        "linear",
        vec![
            node("A", "literal", json!({ "value": "hi" })),
            node("B", "echo", json!({ "prefix": "X-", "text": "{{A}}" })),
        ],
        vec![edge("A", "B")],
    )
}

async fn await_terminal(executor: &WorkflowExecutor, execution_id: Uuid) -> Execution {
    for _ in 0..500 {
        let execution = executor.status(execution_id).await.expect("status");
        if execution.status.is_terminal() {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("execution never reached a terminal state");
}

async fn submit_and_wait(
    executor: &WorkflowExecutor,
    store: &Arc<MemStore>,
    workflow: &Workflow,
    input: Map<String, Value>,
    use_cache: bool,
) -> Execution {
    store.create_workflow(workflow).await.unwrap();
    let execution_id = executor
        .submit(workflow.id, input, use_cache)
        .await
        .expect("submit");
    await_terminal(executor, execution_id).await
}

// ============================================================
// End-to-end pipelines
// ============================================================

#[tokio::test]
async fn linear_pipeline_streams_output_downstream() {
    let workflow = linear_workflow();

    let plan = build_plan(&workflow).unwrap();
    assert_eq!(plan.levels(), [vec!["A"], vec!["B"]]);

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.output, json!("X-hi"));
    assert!(execution.node_results["A"].success);
    assert!(execution.node_results["B"].success);
}

#[tokio::test]
async fn fan_out_fan_in_joins_parallel_branches() {
    let workflow = Workflow::new(
        "diamond",
        vec![
            node("R", "literal", json!({ "value": 42 })),
            node("L", "echo", json!({ "text": "{{R}}" })),
            node("U", "echo", json!({ "text": "{{R}}" })),
            node("J", "concat", json!({ "text": "{{L}}|{{U}}" })),
        ],
        vec![edge("R", "L"), edge("R", "U"), edge("L", "J"), edge("U", "J")],
    );

    let plan = build_plan(&workflow).unwrap();
    assert_eq!(plan.levels(), [vec!["R"], vec!["L", "U"], vec!["J"]]);

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.output, json!("42|42"));
    // Every node of a successful execution carries a successful result.
    assert_eq!(execution.node_results.len(), 4);
    assert!(execution.node_results.values().all(|r| r.success));
}

#[tokio::test]
async fn unresolved_reference_passes_through_verbatim() {
    let workflow = Workflow::new(
        "dangling",
        vec![node("N", "echo", json!({ "text": "{{missing.key}}" }))],
        vec![],
    );

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.output, json!("{{missing.key}}"));
}

#[tokio::test]
async fn cyclic_graph_is_rejected_at_validation() {
    let workflow = Workflow::new(
        "cyclic",
        vec![
            node("A", "literal", json!({ "value": 1 })),
            node("B", "literal", json!({ "value": 2 })),
        ],
        vec![edge("A", "B"), edge("B", "A")],
    );

    let registry = test_registry();
    assert_eq!(
        graph::validate(&workflow, &registry),
        Err(GraphError::CycleDetected)
    );
}

#[tokio::test]
async fn second_identical_run_hits_the_cache() {
    let workflow = linear_workflow();
    let (executor, store) = fixture(EngineConfig::default());

    let first = submit_and_wait(&executor, &store, &workflow, Map::new(), true).await;
    let second = {
        let execution_id = executor.submit(workflow.id, Map::new(), true).await.unwrap();
        await_terminal(&executor, execution_id).await
    };

    assert_eq!(first.status, ExecutionStatus::Success);
    assert_eq!(second.status, ExecutionStatus::Success);
    assert_eq!(second.output, json!("X-hi"));

    assert!(!first.node_results["B"].cached);
    assert!(second.node_results["B"].cached);
    assert!(second.node_results["B"].duration_ms <= first.node_results["B"].duration_ms);
    assert!(executor.cache_stats().hits >= 2);
}

#[tokio::test]
async fn failed_node_fails_fast_and_skips_successors() {
    let workflow = Workflow::new(
        "failing",
        vec![
            node("A", "literal", json!({ "value": "start" })),
            node("B", "boom", json!({})),
            node("C", "echo", json!({ "text": "{{B}}" })),
        ],
        vec![edge("A", "B"), edge("B", "C")],
    );

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.node_results.contains_key("A"));
    assert!(execution.node_results.contains_key("B"));
    assert!(!execution.node_results.contains_key("C"));
    assert_eq!(execution.output, Value::Null);

    let error = execution.error.expect("failed execution records an error");
    assert!(error.contains("'B'"), "error should name the node: {error}");
    assert!(error.contains("something broke"));
}

// ============================================================
// Cache, cancellation, and lifecycle
// ============================================================

#[tokio::test]
async fn caller_inputs_are_visible_to_templates() {
    let workflow = Workflow::new(
        "templated",
        vec![node("greet", "echo", json!({ "text": "hello {{topic}}" }))],
        vec![],
    );

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(
        &executor,
        &store,
        &workflow,
        inputs(&[("topic", json!("rust"))]),
        false,
    )
    .await;

    assert_eq!(execution.output, json!("hello rust"));
}

#[tokio::test]
async fn sink_node_output_wins_over_terminal_fallback() {
    let workflow = Workflow::new(
        "with-sink",
        vec![
            node("gen", "literal", json!({ "value": { "text": "payload" } })),
            node("final", "output", json!({ "fields": ["gen.text"] })),
        ],
        vec![edge("gen", "final")],
    );

    let (executor, store) = fixture(EngineConfig::default());
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.output, json!({ "gen.text": "payload" }));
}

#[tokio::test]
async fn continue_on_error_nulls_the_failed_output() {
    let workflow = Workflow::new(
        "lenient",
        vec![
            node("A", "boom", json!({})),
            node("B", "echo", json!({ "prefix": "got:", "text": "{{A}}" })),
        ],
        vec![edge("A", "B")],
    );

    let config = EngineConfig {
        continue_on_error: true,
        ..EngineConfig::default()
    };
    let (executor, store) = fixture(config);
    let execution = submit_and_wait(&executor, &store, &workflow, Map::new(), false).await;

    // Downstream ran with the failed node's output as null…
    let b = &execution.node_results["B"];
    assert!(b.success);
    assert_eq!(b.output, json!("got:"));

    // …but a failed node still fails the execution at the end.
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.output, Value::Null);
}

#[tokio::test]
async fn non_cacheable_kinds_bypass_the_cache() {
    let workflow = Workflow::new(
        "dicey",
        vec![node("roll", "dice", json!({}))],
        vec![],
    );

    let (executor, store) = fixture(EngineConfig::default());
    let first = submit_and_wait(&executor, &store, &workflow, Map::new(), true).await;
    let second = {
        let execution_id = executor.submit(workflow.id, Map::new(), true).await.unwrap();
        await_terminal(&executor, execution_id).await
    };

    assert!(!first.node_results["roll"].cached);
    assert!(!second.node_results["roll"].cached);
}

#[tokio::test]
async fn cache_master_switch_overrides_use_cache() {
    let workflow = linear_workflow();
    let config = EngineConfig {
        cache_enabled: false,
        ..EngineConfig::default()
    };
    let (executor, store) = fixture(config);

    let first = submit_and_wait(&executor, &store, &workflow, Map::new(), true).await;
    let second = {
        let execution_id = executor.submit(workflow.id, Map::new(), true).await.unwrap();
        await_terminal(&executor, execution_id).await
    };

    assert!(!first.node_results["B"].cached);
    assert!(!second.node_results["B"].cached);
}

#[tokio::test]
async fn cancel_stops_between_levels() {
    let workflow = Workflow::new(
        "cancellable",
        vec![
            node("S", "slow", json!({})),
            node("T", "echo", json!({ "text": "{{S}}" })),
        ],
        vec![edge("S", "T")],
    );

    let (executor, store) = fixture(EngineConfig::default());
    store.create_workflow(&workflow).await.unwrap();
    let execution_id = executor.submit(workflow.id, Map::new(), false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    executor.cancel(execution_id).await.unwrap();

    let execution = await_terminal(&executor, execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert!(!execution.node_results.contains_key("T"));
}

#[tokio::test]
async fn deadline_expiry_equals_cancellation() {
    let workflow = Workflow::new("deadline", vec![node("S", "slow", json!({}))], vec![]);

    let (executor, store) = fixture(EngineConfig::default());
    store.create_workflow(&workflow).await.unwrap();
    let execution_id = executor
        .submit_with_deadline(
            workflow.id,
            Map::new(),
            false,
            Some(Duration::from_millis(30)),
        )
        .await
        .unwrap();

    let execution = await_terminal(&executor, execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn submit_for_unknown_workflow_is_rejected() {
    let (executor, _store) = fixture(EngineConfig::default());
    let missing = Uuid::new_v4();

    let err = executor.submit(missing, Map::new(), false).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownWorkflow(id) if id == missing));
}

#[tokio::test]
async fn status_of_unknown_execution_is_rejected() {
    let (executor, _store) = fixture(EngineConfig::default());
    let err = executor.status(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownExecution(_)));
}

#[tokio::test]
async fn executions_snapshot_the_definition_at_submit() {
    let workflow = linear_workflow();
    let (executor, store) = fixture(EngineConfig::default());
    store.create_workflow(&workflow).await.unwrap();

    let execution_id = executor.submit(workflow.id, Map::new(), false).await.unwrap();

    // Edit the stored definition immediately; the running execution keeps
    // the snapshot taken at submit.
    let mut edited = workflow.clone();
    edited.nodes[1].config = json!({ "prefix": "Y-", "text": "{{A}}" });
    edited.version += 1;
    store.update_workflow(workflow.id, &edited).await.unwrap();

    let execution = await_terminal(&executor, execution_id).await;
    assert_eq!(execution.output, json!("X-hi"));
}

#[tokio::test]
async fn preview_runs_one_node_without_persistence() {
    let (executor, store) = fixture(EngineConfig::default());

    let context = inputs(&[("A", json!("hi"))]);
    let result = executor
        .preview_node(
            "echo",
            &json!({ "prefix": "X-", "text": "{{A}}" }),
            &Map::new(),
            &context,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output, json!("X-hi"));
    assert!(store.executions.read().unwrap().is_empty());

    let err = executor
        .preview_node("teleport", &json!({}), &Map::new(), &Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Registry(_)));
}

#[tokio::test]
async fn recover_fails_stale_in_flight_executions() {
    let workflow = linear_workflow();
    let (executor, store) = fixture(EngineConfig::default());
    store.create_workflow(&workflow).await.unwrap();

    let mut stale = Execution::new(workflow.id, Map::new(), false);
    stale.status = ExecutionStatus::Running;
    store.create_execution(&stale).await.unwrap();

    let recovered = executor.recover().await.unwrap();
    assert_eq!(recovered, 1);

    let execution = executor.status(stale.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("restarted"));
}

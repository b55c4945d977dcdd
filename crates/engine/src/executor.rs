//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. `submit` snapshots the workflow, creates a pending execution record
//!    and schedules the run as a background task.
//! 2. The task validates the graph, builds the level plan, and drives it:
//!    per level, every node is spawned concurrently (bounded by the worker
//!    semaphore), templates in its config are resolved against the
//!    execution context, the cache is consulted, and the result is
//!    recorded before the next level starts.
//! 3. `NodeError::Retryable` failures retry with exponential back-off up
//!    to `max_retries`; `NodeError::Fatal` fails the node immediately.
//! 4. Cancellation is checked at the level barrier; nodes receive a
//!    context handle whose token they should honour mid-level.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use nodes::{NodeContext, NodeDescriptor, NodeError, NodeRegistry};
use uuid::Uuid;

use crate::cache::{CacheStats, ExecutionCache};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::graph::{self, GraphIndex};
use crate::models::{Execution, ExecutionStatus, NodeResult, Workflow};
use crate::plan;
use crate::storage::{Storage, StorageError};
use crate::template;
use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Submit-and-poll orchestrator. Every field is shared, so clones are
/// cheap and the transport layer can hold it as application state.
/// Executions run as independent tokio tasks sharing the worker semaphore
/// and the result cache.
#[derive(Clone)]
pub struct WorkflowExecutor {
    storage: Arc<dyn Storage>,
    registry: Arc<NodeRegistry>,
    cache: Arc<ExecutionCache>,
    config: EngineConfig,
    workers: Arc<Semaphore>,
    cancellations: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl WorkflowExecutor {
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: Arc<NodeRegistry>,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(ExecutionCache::new(
            config.cache_max_entries,
            config.cache_default_ttl,
        ));
        Self {
            workers: Arc::new(Semaphore::new(config.worker_count.max(1))),
            storage,
            registry,
            cache,
            config,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // -----------------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------------

    /// Create a pending execution for the workflow, schedule the run, and
    /// return its id immediately.
    pub async fn submit(
        &self,
        workflow_id: Uuid,
        inputs: Map<String, Value>,
        use_cache: bool,
    ) -> Result<Uuid, EngineError> {
        self.submit_with_deadline(workflow_id, inputs, use_cache, self.config.execution_timeout)
            .await
    }

    /// Like [`submit`](Self::submit) with an explicit deadline; expiry is
    /// equivalent to a `cancel` call.
    pub async fn submit_with_deadline(
        &self,
        workflow_id: Uuid,
        inputs: Map<String, Value>,
        use_cache: bool,
        deadline: Option<Duration>,
    ) -> Result<Uuid, EngineError> {
        // Snapshot the definition now: long-running executions never see
        // subsequent edits.
        let workflow = self
            .storage
            .get_workflow(workflow_id)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => EngineError::UnknownWorkflow(workflow_id),
                other => EngineError::Storage(other),
            })?;

        let execution = Execution::new(
            workflow_id,
            inputs,
            use_cache && self.config.cache_enabled,
        );
        let execution_id = self.storage.create_execution(&execution).await?;

        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .unwrap()
            .insert(execution_id, token.clone());

        if let Some(deadline) = deadline {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => timer.cancel(),
                    _ = timer.cancelled() => {}
                }
            });
        }

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(workflow, execution, token.clone()).await;
            engine.cancellations.lock().unwrap().remove(&execution_id);
            // Releases the deadline timer; the flag is never read again.
            token.cancel();
        });

        Ok(execution_id)
    }

    /// Current execution record.
    pub async fn status(&self, execution_id: Uuid) -> Result<Execution, EngineError> {
        self.storage
            .get_execution(execution_id)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => EngineError::UnknownExecution(execution_id),
                other => EngineError::Storage(other),
            })
    }

    /// Request cancellation. The executor checks the flag between levels;
    /// in-flight nodes see it through their context handle.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<(), EngineError> {
        let execution = self.status(execution_id).await?;

        if let Some(token) = self.cancellations.lock().unwrap().get(&execution_id) {
            token.cancel();
        } else if !execution.status.is_terminal() {
            warn!(%execution_id, "no cancellation handle for non-terminal execution");
        }
        Ok(())
    }

    /// Run a single node kind in isolation against the provided inputs and
    /// context, bypassing persistence and the cache.
    pub async fn preview_node(
        &self,
        kind: &str,
        config: &Value,
        inputs: &Map<String, Value>,
        context: &Map<String, Value>,
    ) -> Result<NodeResult, EngineError> {
        let descriptor = self.registry.get(kind)?.clone();
        let resolved_config = template::resolve_value(config, context);
        let ctx = NodeContext::new(
            Uuid::nil(),
            Uuid::new_v4(),
            format!("preview:{kind}"),
            Arc::new(context.clone()),
            Arc::new(context.clone()),
            CancellationToken::new(),
        );

        let started = Instant::now();
        let outcome = descriptor.node().run(&resolved_config, inputs, &ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(output) => NodeResult::success(output, duration_ms),
            Err(err) => NodeResult::failure(err.to_string(), duration_ms),
        };
        result
            .metadata
            .insert("kind".into(), Value::String(descriptor.kind.clone()));
        Ok(result)
    }

    /// Mark executions that were in flight when the process last exited as
    /// failed. Returns how many were recovered.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let mut recovered = 0usize;
        for workflow in self.storage.list_workflows().await? {
            for mut execution in self.storage.list_executions(workflow.id).await? {
                if execution.status.is_terminal() {
                    continue;
                }
                execution.status = ExecutionStatus::Failed;
                execution.error =
                    Some("process restarted while execution was in flight".to_string());
                execution.finished_at = Some(Utc::now());
                self.storage
                    .update_execution(execution.id, &execution)
                    .await?;
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!(recovered, "marked in-flight executions as failed");
        }
        Ok(recovered)
    }

    // -----------------------------------------------------------------------
    // The scheduled task
    // -----------------------------------------------------------------------

    #[instrument(skip_all, fields(workflow_id = %workflow.id, execution_id = %execution.id))]
    async fn run(&self, workflow: Workflow, mut execution: Execution, cancel: CancellationToken) {
        let started = Instant::now();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        if let Err(err) = self.persist(&execution).await {
            error!(error = %err, "could not mark execution running");
        }

        match self.drive(&workflow, &mut execution, &cancel).await {
            Ok(()) => {
                execution.status = ExecutionStatus::Success;
                info!("execution succeeded");
            }
            Err(EngineError::Cancelled) => {
                execution.status = ExecutionStatus::Cancelled;
                execution.error = Some(EngineError::Cancelled.to_string());
                warn!("execution cancelled");
            }
            Err(err) => {
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(err.to_string());
                error!(error = %err, "execution failed");
            }
        }

        execution.finished_at = Some(Utc::now());
        execution.duration_ms = Some(started.elapsed().as_millis() as u64);

        if let Err(err) = self.persist(&execution).await {
            error!(error = %err, "could not persist terminal execution state");
        }
    }

    /// The plan loop. Returns `Ok` with `execution.output` populated, or
    /// the error that decides the terminal status.
    async fn drive(
        &self,
        workflow: &Workflow,
        execution: &mut Execution,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        // Defense in depth: the definition was validated at create/update
        // time, but storage contents may predate rule changes.
        graph::validate(workflow, &self.registry)?;
        let plan = plan::build_plan(workflow)?;
        info!(
            levels = plan.levels().len(),
            nodes = workflow.nodes.len(),
            "plan built"
        );

        let node_map: HashMap<&str, _> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        let mut context = ExecutionContext::seeded(&execution.input);
        let caller_inputs = Arc::new(execution.input.clone());
        let mut first_failure: Option<(String, String)> = None;

        for level in plan.levels() {
            // Between levels is the natural quiescence point.
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let snapshot = Arc::new(context.values().clone());
            let mut handles = Vec::with_capacity(level.len());

            for node_id in level {
                let node = node_map.get(node_id.as_str()).ok_or_else(|| {
                    EngineError::Internal(format!("planned node '{node_id}' not in workflow"))
                })?;
                let descriptor = self.registry.get(&node.kind)?.clone();

                // Inputs: one entry per predecessor, in edge-insertion
                // order; reads are from earlier levels only.
                let mut node_inputs = Map::new();
                for pred in plan.predecessors(node_id) {
                    node_inputs.insert(
                        pred.clone(),
                        context.get(pred).cloned().unwrap_or(Value::Null),
                    );
                }
                let resolved_config = template::resolve_value(&node.config, context.values());

                let ctx = NodeContext::new(
                    workflow.id,
                    execution.id,
                    node_id.clone(),
                    Arc::clone(&caller_inputs),
                    Arc::clone(&snapshot),
                    cancel.clone(),
                );
                let cache = Arc::clone(&self.cache);
                let config = self.config.clone();
                let workers = Arc::clone(&self.workers);
                let use_cache = execution.use_cache;

                let handle = tokio::spawn(async move {
                    let _permit = workers.acquire_owned().await.ok();
                    run_node(
                        cache,
                        config,
                        use_cache,
                        descriptor,
                        resolved_config,
                        node_inputs,
                        ctx,
                    )
                    .await
                });
                handles.push((node_id.clone(), handle));
            }

            // Barrier: every node in this level completes before the next
            // level starts — even when a sibling has already failed.
            let joined = futures::future::join_all(
                handles
                    .into_iter()
                    .map(|(node_id, handle)| async move { (node_id, handle.await) }),
            )
            .await;

            for (node_id, outcome) in joined {
                let result = match outcome {
                    Ok(result) => result,
                    Err(err) => NodeResult::failure(format!("node task aborted: {err}"), 0),
                };

                if result.success {
                    debug!(node_id = %node_id, cached = result.cached, "node succeeded");
                    context.insert_output(&node_id, result.output.clone());
                } else {
                    let message = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string());
                    error!(node_id = %node_id, %message, "node failed");
                    if self.config.continue_on_error {
                        // Downstream template references resolve to null.
                        context.insert_output(&node_id, Value::Null);
                    }
                    if first_failure.is_none() {
                        first_failure = Some((node_id.clone(), message));
                    }
                }
                execution.node_results.insert(node_id, result);
            }

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            if let (Some((node_id, message)), false) =
                (&first_failure, self.config.continue_on_error)
            {
                // Fail fast: successor levels are not executed.
                return Err(EngineError::NodeFailed {
                    node_id: node_id.clone(),
                    message: message.clone(),
                });
            }

            self.persist(execution).await?;
        }

        if let Some((node_id, message)) = first_failure {
            return Err(EngineError::NodeFailed { node_id, message });
        }

        execution.output = self.extract_output(workflow, &context);
        Ok(())
    }

    /// Final output: the sink-kind nodes' outputs, falling back to the
    /// terminal nodes when the workflow declares no sink. A single sink
    /// yields its output directly.
    fn extract_output(&self, workflow: &Workflow, context: &ExecutionContext) -> Value {
        let mut sink_ids: Vec<&str> = workflow
            .nodes
            .iter()
            .filter(|n| n.kind == self.config.sink_kind)
            .map(|n| n.id.as_str())
            .collect();

        if sink_ids.is_empty() {
            let index = GraphIndex::build(workflow);
            sink_ids = workflow
                .nodes
                .iter()
                .filter(|n| index.successors(&n.id).is_empty())
                .map(|n| n.id.as_str())
                .collect();
        }

        match sink_ids.as_slice() {
            [only] => context.get(only).cloned().unwrap_or(Value::Null),
            many => Value::Object(
                many.iter()
                    .map(|id| {
                        (
                            id.to_string(),
                            context.get(id).cloned().unwrap_or(Value::Null),
                        )
                    })
                    .collect(),
            ),
        }
    }

    /// Persist the execution record, retrying once before giving up.
    async fn persist(&self, execution: &Execution) -> Result<(), EngineError> {
        if let Err(first) = self.storage.update_execution(execution.id, execution).await {
            warn!(error = %first, "execution update failed, retrying once");
            self.storage
                .update_execution(execution.id, execution)
                .await
                .map_err(|second| {
                    EngineError::Internal(format!("execution update failed twice: {second}"))
                })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Single node invocation
// ---------------------------------------------------------------------------

/// Cache consult + invocation with retry; always yields a `NodeResult`.
async fn run_node(
    cache: Arc<ExecutionCache>,
    config: EngineConfig,
    use_cache: bool,
    descriptor: NodeDescriptor,
    resolved_config: Value,
    inputs: Map<String, Value>,
    ctx: NodeContext,
) -> NodeResult {
    let started = Instant::now();

    let cache_key = (use_cache && descriptor.cacheable)
        .then(|| ExecutionCache::fingerprint(&descriptor.kind, &resolved_config, &inputs));

    if let Some(key) = &cache_key {
        if let Some(hit) = cache.get(key) {
            return hit;
        }
    }

    let node = descriptor.node();
    let mut attempts = 0u32;
    let outcome = loop {
        match node.run(&resolved_config, &inputs, &ctx).await {
            Ok(output) => break Ok(output),
            Err(NodeError::Fatal(message)) => break Err(message),
            Err(NodeError::Retryable(message)) => {
                attempts += 1;
                if attempts > config.max_retries {
                    break Err(format!(
                        "retry limit ({}) exceeded: {message}",
                        config.max_retries
                    ));
                }
                let delay = config.retry_base_delay * 2u32.pow(attempts.saturating_sub(1));
                warn!(
                    node_id = %ctx.node_id,
                    attempt = attempts,
                    max = config.max_retries,
                    ?delay,
                    %message,
                    "retryable node error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    let mut result = match outcome {
        Ok(output) => NodeResult::success(output, duration_ms),
        Err(message) => NodeResult::failure(message, duration_ms),
    };
    result
        .metadata
        .insert("kind".into(), Value::String(descriptor.kind.clone()));

    if result.success {
        if let Some(key) = cache_key {
            cache.put(key, &result, None);
        }
    }
    result
}

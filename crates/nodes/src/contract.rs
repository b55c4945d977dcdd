//! The `NodeKind` trait — the contract every node kind must fulfil.
//! Also home to the per-invocation context handle.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::NodeError;

// ---------------------------------------------------------------------------
// NodeContext
// ---------------------------------------------------------------------------

/// Per-invocation handle passed to every node during execution.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// ID of the node being invoked.
    pub node_id: String,
    caller_inputs: Arc<Map<String, Value>>,
    vars: Arc<Map<String, Value>>,
    cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(
        workflow_id: Uuid,
        execution_id: Uuid,
        node_id: impl Into<String>,
        caller_inputs: Arc<Map<String, Value>>,
        vars: Arc<Map<String, Value>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            workflow_id,
            execution_id,
            node_id: node_id.into(),
            caller_inputs,
            vars,
            cancellation,
        }
    }

    /// A detached context for previews and tests: fresh ids, empty maps,
    /// and a token nobody cancels.
    pub fn detached(node_id: impl Into<String>) -> Self {
        Self::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            node_id,
            Arc::new(Map::new()),
            Arc::new(Map::new()),
            CancellationToken::new(),
        )
    }

    /// The original execution input map (read-only).
    pub fn caller_inputs(&self) -> &Map<String, Value> {
        &self.caller_inputs
    }

    /// Snapshot of the execution context at the time this node was
    /// dispatched: caller inputs plus the outputs of completed nodes.
    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    /// True once cancellation of the owning execution has been requested.
    /// Long-running nodes should poll this between units of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Completes when the owning execution is cancelled. Suitable for
    /// `tokio::select!` against in-flight I/O.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The core node contract.
///
/// `config` arrives with all `{{path}}` references already resolved by the
/// executor; `inputs` maps each predecessor's node id to that predecessor's
/// output. Implementations must not assume anything about sibling execution
/// order and must be safe to invoke concurrently across distinct nodes.
#[async_trait]
pub trait NodeKind: Send + Sync {
    /// Execute the node and return its JSON output.
    async fn run(
        &self,
        config: &Value,
        inputs: &Map<String, Value>,
        ctx: &NodeContext,
    ) -> Result<Value, NodeError>;

    /// Structural descriptor of the accepted configuration; enforced during
    /// workflow validation.
    fn config_schema(&self) -> Value;

    /// Descriptor of the expected inputs. Preview tooling only.
    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Descriptor of the produced output. Preview tooling only.
    fn output_schema(&self) -> Value {
        json!({})
    }
}

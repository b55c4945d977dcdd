//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;
use nodes::RegistryError;

// ---------------------------------------------------------------------------
// Graph validation errors
// ---------------------------------------------------------------------------

/// A violation found while validating a workflow graph.  Ordered here the
/// way validation checks them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node has an empty id.
    #[error("node id must not be empty")]
    EmptyNodeId,

    /// Two or more nodes share the same id.
    #[error("duplicate node id: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node id that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// An edge connects a node to itself.
    #[error("node '{0}' has an edge to itself")]
    SelfLoop(String),

    /// The same edge appears more than once.
    #[error("duplicate edge '{from_node}' -> '{target}'")]
    DuplicateEdge { from_node: String, target: String },

    /// A node references a kind that isn't in the registry.
    #[error("node '{node_id}' uses unknown kind '{kind}'")]
    UnknownKind { node_id: String, kind: String },

    /// A node's configuration doesn't satisfy its kind's schema.
    #[error("node '{node_id}' has invalid config: {message}")]
    InvalidConfig { node_id: String, message: String },

    /// The edge relation contains a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Graph validation failed during create/update or pre-execution.
    #[error("invalid workflow graph: {0}")]
    InvalidGraph(#[from] GraphError),

    /// Workflow lookup failed at the storage boundary.
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(Uuid),

    /// Execution lookup failed at the storage boundary.
    #[error("unknown execution: {0}")]
    UnknownExecution(Uuid),

    /// Registry lookup or registration failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A node returned `success=false` or raised; recorded on the
    /// execution, surfaced to pollers through the record's `error` field.
    #[error("node '{node_id}' failed: {message}")]
    NodeFailed { node_id: String, message: String },

    /// The execution was cancelled or timed out.
    #[error("execution cancelled")]
    Cancelled,

    /// Persistence failure surfaced from the storage interface.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Executor-internal failure (e.g. persistence retries exhausted).
    #[error("internal error: {0}")]
    Internal(String),
}

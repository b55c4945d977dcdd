//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node kind's `run` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable` — transient; re-invoked with exponential back-off.
/// - `Fatal`     — permanent; becomes a failed result immediately.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Transient failure; the engine may re-invoke the node.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),
}

impl NodeError {
    /// Shorthand for a fatal error built from any displayable value.
    pub fn fatal(msg: impl std::fmt::Display) -> Self {
        Self::Fatal(msg.to_string())
    }
}

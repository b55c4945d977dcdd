//! `MockNode` — a test double for `NodeKind`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Sleep first, then return a value. Lets tests exercise timing,
    /// cancellation, and level barriers.
    DelayThenReturn(Duration, Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `run` is called.
    pub behaviour: MockBehaviour,
    /// All `(config, inputs)` pairs seen by this node, in call order.
    pub calls: Arc<Mutex<Vec<(Value, Map<String, Value>)>>>,
}

impl MockNode {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that sleeps for `delay` before succeeding.
    pub fn delayed(name: impl Into<String>, delay: Duration, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::DelayThenReturn(delay, value))
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailRetryable(msg.into()))
    }

    /// Number of times this node has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeKind for MockNode {
    async fn run(
        &self,
        config: &Value,
        inputs: &Map<String, Value>,
        ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        self.calls
            .lock()
            .unwrap()
            .push((config.clone(), inputs.clone()));

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::DelayThenReturn(delay, v) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => Ok(v.clone()),
                    _ = ctx.cancelled() => {
                        Err(NodeError::Fatal(format!("node '{}' cancelled", self.name)))
                    }
                }
            }
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }

    fn config_schema(&self) -> Value {
        json!({ "type": "object" })
    }
}

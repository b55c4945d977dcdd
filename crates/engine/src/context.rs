//! The per-execution context map.
//!
//! Seeded with the caller's input map at the top level, then extended with
//! one entry per completed node keyed by node id.  A node id shadows an
//! input key of the same name.  The context exists only for the duration
//! of a running execution.

use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    /// Build a context seeded with the caller-supplied input map.
    pub fn seeded(inputs: &Map<String, Value>) -> Self {
        Self {
            values: inputs.clone(),
        }
    }

    /// Record a completed node's output under its node id, shadowing any
    /// caller input of the same name.
    pub fn insert_output(&mut self, node_id: &str, output: Value) {
        self.values.insert(node_id.to_string(), output);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The full reference-root → value map, for template resolution.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

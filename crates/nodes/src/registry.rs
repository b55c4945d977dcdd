//! Node-type registry.
//!
//! A process-wide mapping from `kind` strings to [`NodeDescriptor`]s. The
//! registry is populated once at start-up (see `builtin::register_builtins`)
//! and treated as read-only afterwards; the engine receives it behind an
//! `Arc` and never locks it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::contract::NodeKind;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A kind was re-registered with a descriptor that differs from the
    /// one already stored.
    #[error("node kind '{0}' is already registered with a different descriptor")]
    DuplicateKind(String),

    /// Lookup of a kind that was never registered.
    #[error("unknown node kind '{0}'")]
    UnknownKind(String),
}

// ---------------------------------------------------------------------------
// NodeDescriptor
// ---------------------------------------------------------------------------

/// Everything the engine and the API layer need to know about one node kind.
///
/// The shared `Arc<dyn NodeKind>` doubles as the factory: node kinds are
/// stateless, so a single instance serves every invocation.
#[derive(Clone)]
pub struct NodeDescriptor {
    pub kind: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    /// Non-deterministic kinds set this to false to opt out of the result
    /// cache entirely.
    pub cacheable: bool,
    node: Arc<dyn NodeKind>,
}

impl NodeDescriptor {
    pub fn new(
        kind: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        node: Arc<dyn NodeKind>,
    ) -> Self {
        Self {
            kind: kind.into(),
            display_name: display_name.into(),
            description: description.into(),
            category: category.into(),
            cacheable: true,
            node,
        }
    }

    /// Mark this kind as non-deterministic; the executor will skip cache
    /// lookup and store for its nodes.
    pub fn not_cacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn node(&self) -> Arc<dyn NodeKind> {
        Arc::clone(&self.node)
    }

    pub fn config_schema(&self) -> Value {
        self.node.config_schema()
    }

    pub fn input_schema(&self) -> Value {
        self.node.input_schema()
    }

    pub fn output_schema(&self) -> Value {
        self.node.output_schema()
    }

    // Trait objects are not comparable, so descriptor identity is the
    // metadata + schema tuple.
    fn identity(&self) -> (String, String, String, bool, Value, Value, Value) {
        (
            self.display_name.clone(),
            self.description.clone(),
            self.category.clone(),
            self.cacheable,
            self.config_schema(),
            self.input_schema(),
            self.output_schema(),
        )
    }
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("kind", &self.kind)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

/// Serializable view of a descriptor for the node catalogue endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct NodeKindInfo {
    pub kind: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub cacheable: bool,
    pub config_schema: Value,
    pub input_schema: Value,
    pub output_schema: Value,
}

impl From<&NodeDescriptor> for NodeKindInfo {
    fn from(d: &NodeDescriptor) -> Self {
        Self {
            kind: d.kind.clone(),
            display_name: d.display_name.clone(),
            description: d.description.clone(),
            category: d.category.clone(),
            cacheable: d.cacheable,
            config_schema: d.config_schema(),
            input_schema: d.input_schema(),
            output_schema: d.output_schema(),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeRegistry
// ---------------------------------------------------------------------------

/// Insertion-ordered registry of node kinds.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: Vec<NodeDescriptor>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node kind.
    ///
    /// Registration is idempotent with respect to identical descriptors;
    /// re-registering a kind with a different descriptor fails.
    pub fn register(&mut self, descriptor: NodeDescriptor) -> Result<(), RegistryError> {
        if let Some(&pos) = self.index.get(&descriptor.kind) {
            if self.entries[pos].identity() == descriptor.identity() {
                return Ok(());
            }
            return Err(RegistryError::DuplicateKind(descriptor.kind));
        }

        self.index
            .insert(descriptor.kind.clone(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<&NodeDescriptor, RegistryError> {
        self.index
            .get(kind)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> &[NodeDescriptor] {
        &self.entries
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .entries
            .iter()
            .map(|d| d.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

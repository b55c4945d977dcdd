//! Workflow graph validation and adjacency index.
//!
//! `validate` runs the full rule set in a fixed order and reports the
//! first violation.  `GraphIndex` gives constant-time predecessor and
//! successor lookups after a single build pass.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use nodes::NodeRegistry;

use crate::error::GraphError;
use crate::models::Workflow;
use crate::plan;

// ---------------------------------------------------------------------------
// GraphIndex
// ---------------------------------------------------------------------------

/// Adjacency index over a workflow's edge relation. Edge insertion order
/// is preserved in both directions.
#[derive(Debug, Default)]
pub struct GraphIndex {
    predecessors: HashMap<String, Vec<String>>,
    successors: HashMap<String, Vec<String>>,
}

impl GraphIndex {
    pub fn build(workflow: &Workflow) -> Self {
        let mut index = Self::default();
        for node in &workflow.nodes {
            index.predecessors.entry(node.id.clone()).or_default();
            index.successors.entry(node.id.clone()).or_default();
        }
        for edge in &workflow.edges {
            index
                .predecessors
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
            index
                .successors
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        index
    }

    /// Sources of incoming edges, in edge-insertion order.
    pub fn predecessors(&self, node_id: &str) -> &[String] {
        self.predecessors.get(node_id).map_or(&[], Vec::as_slice)
    }

    /// Targets of outgoing edges, in edge-insertion order.
    pub fn successors(&self, node_id: &str) -> &[String] {
        self.successors.get(node_id).map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the workflow, reporting the first violation found.
///
/// Checking order: node ids non-empty and unique; edge endpoints exist;
/// no self-loops; no duplicate edges; every kind registered; config
/// satisfies the kind's schema; graph is acyclic.
pub fn validate(workflow: &Workflow, registry: &NodeRegistry) -> Result<(), GraphError> {
    let mut seen_ids: HashSet<&str> = HashSet::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        if node.id.trim().is_empty() {
            return Err(GraphError::EmptyNodeId);
        }
        if !seen_ids.insert(node.id.as_str()) {
            return Err(GraphError::DuplicateNodeId(node.id.clone()));
        }
    }

    let mut seen_edges: HashSet<(&str, &str)> = HashSet::with_capacity(workflow.edges.len());
    for edge in &workflow.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(GraphError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(GraphError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source.clone()));
        }
        if !seen_edges.insert((edge.source.as_str(), edge.target.as_str())) {
            return Err(GraphError::DuplicateEdge {
                from_node: edge.source.clone(),
                target: edge.target.clone(),
            });
        }
    }

    for node in &workflow.nodes {
        let Ok(descriptor) = registry.get(&node.kind) else {
            return Err(GraphError::UnknownKind {
                node_id: node.id.clone(),
                kind: node.kind.clone(),
            });
        };
        if let Err(message) = check_config(&descriptor.config_schema(), &node.config) {
            return Err(GraphError::InvalidConfig {
                node_id: node.id.clone(),
                message,
            });
        }
    }

    // A plan exists iff the graph is acyclic; building one is the check.
    plan::build_plan(workflow).map(|_| ())
}

/// Structural check of a node config against its kind's JSON-schema-like
/// descriptor: required keys must be present, and declared property types
/// must match when the property is given.
fn check_config(schema: &Value, config: &Value) -> Result<(), String> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let entries = match config {
        Value::Object(map) => map,
        Value::Null if required.is_empty() => return Ok(()),
        Value::Null => {
            return Err(format!("missing required config key '{}'", required[0]));
        }
        other => return Err(format!("config must be an object, got {other}")),
    };

    for key in required {
        if !entries.contains_key(key) {
            return Err(format!("missing required config key '{key}'"));
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, descriptor) in properties {
            let (Some(value), Some(expected)) = (
                entries.get(key),
                descriptor.get("type").and_then(Value::as_str),
            ) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "number" | "integer" => value.is_number() || value.is_string(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!("config key '{key}' should be of type {expected}"));
            }
        }
    }

    Ok(())
}

//! Topological planner.
//!
//! Kahn's algorithm, generalised from a flat order to *levels*: each level
//! holds the nodes whose in-edges all land in earlier levels, so nodes
//! within a level are mutually independent and may run in parallel.
//! Levels are sorted by node id to make plans deterministic.

use std::collections::HashMap;

use crate::error::GraphError;
use crate::models::Workflow;

/// An ordered partition of a workflow's nodes into parallel-executable
/// levels, plus each node's predecessor list in edge-insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    levels: Vec<Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
}

impl ExecutionPlan {
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Sources of the node's incoming edges, in edge-insertion order.
    pub fn predecessors(&self, node_id: &str) -> &[String] {
        self.predecessors.get(node_id).map_or(&[], Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Group the workflow's nodes into execution levels.
///
/// # Errors
/// [`GraphError::CycleDetected`] if any nodes remain once the frontier
/// empties (validation should already have caught this).
pub fn build_plan(workflow: &Workflow) -> Result<ExecutionPlan, GraphError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(workflow.nodes.len());
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::with_capacity(workflow.nodes.len());
    let mut predecessors: HashMap<String, Vec<String>> =
        HashMap::with_capacity(workflow.nodes.len());

    for node in &workflow.nodes {
        in_degree.entry(node.id.as_str()).or_insert(0);
        successors.entry(node.id.as_str()).or_default();
        predecessors.entry(node.id.clone()).or_default();
    }

    for edge in &workflow.edges {
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        predecessors
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
    }

    // Seed the frontier with every zero-in-degree node, emit it as a level,
    // decrement successors, and repeat with the newly freed nodes.
    let mut frontier: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    frontier.sort_unstable();

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut emitted = 0usize;

    while !frontier.is_empty() {
        emitted += frontier.len();
        levels.push(frontier.iter().map(|id| id.to_string()).collect());

        let mut next: Vec<&str> = Vec::new();
        for &node_id in &frontier {
            if let Some(succs) = successors.get(node_id) {
                for &succ in succs {
                    let degree = in_degree.entry(succ).or_insert(0);
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(succ);
                    }
                }
            }
        }
        next.sort_unstable();
        frontier = next;
    }

    // Nodes left over when the frontier empties sit on a cycle.
    if emitted != workflow.nodes.len() {
        return Err(GraphError::CycleDetected);
    }

    Ok(ExecutionPlan {
        levels,
        predecessors,
    })
}

//! `engine` crate — domain models, graph validation, the level planner,
//! template resolution, the result cache, and the execution engine.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod models;
pub mod plan;
pub mod storage;
pub mod template;

pub use cache::{CacheStats, ExecutionCache};
pub use config::EngineConfig;
pub use error::{EngineError, GraphError};
pub use executor::WorkflowExecutor;
pub use graph::{validate, GraphIndex};
pub use models::{Edge, Execution, ExecutionStatus, NodeDefinition, NodeResult, Workflow};
pub use plan::{build_plan, ExecutionPlan};
pub use storage::{Storage, StorageError};

#[cfg(test)]
mod executor_tests;

//! `nodes` crate — the `NodeKind` contract, the node-type registry, and the
//! built-in node kinds.
//!
//! Every node kind, built-in and external alike, implements [`NodeKind`]
//! and is registered through a [`NodeDescriptor`]. The engine crate
//! dispatches execution through these trait objects.

pub mod builtin;
pub mod contract;
pub mod error;
pub mod mock;
pub mod registry;

pub use builtin::register_builtins;
pub use contract::{NodeContext, NodeKind};
pub use error::NodeError;
pub use registry::{NodeDescriptor, NodeKindInfo, NodeRegistry, RegistryError};

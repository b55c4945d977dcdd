//! `storage` crate — backends for the engine's storage interface.
//!
//! The trait itself lives in the engine (`engine::storage::Storage`); this
//! crate provides the in-memory backend used by default and in tests, and
//! the Postgres backend used in deployments.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::{create_pool, PgStorage};

//! Persistence layer for ecsync components.
//!
//! The sync core writes every accepted component change through a
//! [`PersistenceAdapter`] and hydrates its in-memory index from the same
//! adapter when a region is attached. Exactly one adapter is active at a
//! time; which one is decided by [`PersistenceConfig`].
//!
//! # Adapters
//!
//! - [`SqliteComponentStore`]: one SQLite table keyed by
//!   (entity, component type, component name)
//! - [`MemoryPersistence`]: process-local map, handy for tests and embedding
//! - [`NullPersistence`]: persistence disabled, every call succeeds
//!
//! Adapters never hold references into the live in-memory store. They take
//! components by reference and hand back owned copies.

mod adapter;
mod config;
mod error;
mod memory;
mod sqlite;

pub use adapter::{NullPersistence, PersistenceAdapter};
pub use config::{open_adapter, Backend, PersistenceConfig, DEFAULT_CONNECTION, DISABLED_CONNECTION};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryPersistence;
pub use sqlite::SqliteComponentStore;

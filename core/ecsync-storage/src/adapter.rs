use crate::error::StorageResult;
use ecsync_types::{Component, ComponentKey, EntityId};

/// Durable backend for components.
///
/// Calls may block on I/O. Callers must not hold the in-memory store lock
/// while calling into an adapter. Timeouts, if any, are the adapter's own
/// business.
pub trait PersistenceAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns every persisted component of `entity_id`.
    ///
    /// An entity with nothing persisted yields an empty vec, not an error.
    fn load_all(&self, entity_id: &EntityId) -> StorageResult<Vec<Component>>;

    /// Writes or overwrites `component` at its key.
    fn store(&self, component: &Component) -> StorageResult<()>;

    /// Deletes the component at `key`. Deleting an absent record succeeds.
    fn remove(&self, entity_id: &EntityId, key: &ComponentKey) -> StorageResult<()>;
}

/// Adapter used when persistence is switched off.
///
/// Loads come back empty and writes succeed without doing anything, so the
/// in-memory store keeps working on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl PersistenceAdapter for NullPersistence {
    fn name(&self) -> &'static str {
        "null"
    }

    fn load_all(&self, _entity_id: &EntityId) -> StorageResult<Vec<Component>> {
        Ok(Vec::new())
    }

    fn store(&self, _component: &Component) -> StorageResult<()> {
        Ok(())
    }

    fn remove(&self, _entity_id: &EntityId, _key: &ComponentKey) -> StorageResult<()> {
        Ok(())
    }
}

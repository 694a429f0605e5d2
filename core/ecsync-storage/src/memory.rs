use crate::adapter::PersistenceAdapter;
use crate::error::{StorageError, StorageResult};
use ecsync_types::{Component, ComponentKey, EntityId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Records = HashMap<EntityId, HashMap<ComponentKey, Component>>;

/// Process-local persistence backed by a map.
///
/// Behaves like a durable adapter (independent copies in and out) without
/// touching disk.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    records: Mutex<Records>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter pre-filled with `components`.
    pub fn with_components(components: impl IntoIterator<Item = Component>) -> Self {
        let mut records = Records::new();
        for component in components {
            records
                .entry(component.entity_id)
                .or_default()
                .insert(component.key(), component);
        }
        Self {
            records: Mutex::new(records),
        }
    }

    /// Returns a copy of one persisted component.
    pub fn get(&self, entity_id: &EntityId, key: &ComponentKey) -> StorageResult<Option<Component>> {
        Ok(self
            .lock()?
            .get(entity_id)
            .and_then(|components| components.get(key))
            .cloned())
    }

    /// Returns the total number of persisted components.
    pub fn component_count(&self) -> StorageResult<usize> {
        Ok(self.lock()?.values().map(HashMap::len).sum())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|e| StorageError::Lock(format!("memory persistence mutex poisoned: {e}")))
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_all(&self, entity_id: &EntityId) -> StorageResult<Vec<Component>> {
        Ok(self
            .lock()?
            .get(entity_id)
            .map(|components| components.values().cloned().collect())
            .unwrap_or_default())
    }

    fn store(&self, component: &Component) -> StorageResult<()> {
        self.lock()?
            .entry(component.entity_id)
            .or_default()
            .insert(component.key(), component.clone());
        Ok(())
    }

    fn remove(&self, entity_id: &EntityId, key: &ComponentKey) -> StorageResult<()> {
        let mut records = self.lock()?;
        if let Some(components) = records.get_mut(entity_id) {
            components.remove(key);
            if components.is_empty() {
                records.remove(entity_id);
            }
        }
        Ok(())
    }
}

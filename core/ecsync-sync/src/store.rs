//! In-memory entity → component index.
//!
//! The store is the single piece of shared mutable state in the sync core.
//! Every operation takes the lock once, does one map operation and releases
//! it, so a panic elsewhere can never leave the map half-updated. That is why
//! poisoned locks are simply recovered here.

use ecsync_types::{Component, ComponentKey, Entity, EntityId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Mapping from entity id to that entity's components.
#[derive(Debug, Default)]
pub struct ComponentStore {
    entities: RwLock<HashMap<EntityId, Entity>>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EntityId, Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EntityId, Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of the entity, or `None` if it was never seen.
    pub fn get(&self, entity_id: &EntityId) -> Option<Entity> {
        self.read().get(entity_id).cloned()
    }

    /// Returns a copy of one component.
    pub fn get_component(&self, entity_id: &EntityId, key: &ComponentKey) -> Option<Component> {
        self.read()
            .get(entity_id)
            .and_then(|entity| entity.component(key))
            .cloned()
    }

    /// Inserts or replaces the component at its key, creating the entity on
    /// first sight. Returns the component it replaced.
    pub fn upsert(&self, component: Component) -> Option<Component> {
        let entity_id = component.entity_id;
        self.write()
            .entry(entity_id)
            .or_insert_with(|| Entity::new(entity_id))
            .insert(component)
    }

    /// Removes the component at `key`. Returns whether anything was removed.
    ///
    /// Unknown entities and keys are a no-op. The entity itself stays in the
    /// index even when its last component goes.
    pub fn remove(&self, entity_id: &EntityId, key: &ComponentKey) -> bool {
        self.write()
            .get_mut(entity_id)
            .and_then(|entity| entity.remove(key))
            .is_some()
    }

    /// Upserts every component, holding the lock once. Returns the count.
    pub fn seed(&self, components: impl IntoIterator<Item = Component>) -> usize {
        let mut entities = self.write();
        let mut count = 0;
        for component in components {
            let entity_id = component.entity_id;
            entities
                .entry(entity_id)
                .or_insert_with(|| Entity::new(entity_id))
                .insert(component);
            count += 1;
        }
        count
    }

    pub fn contains_entity(&self, entity_id: &EntityId) -> bool {
        self.read().contains_key(entity_id)
    }

    /// Returns the ids of all known entities, sorted.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of known entities, including empty ones.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

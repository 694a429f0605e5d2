use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies one component within an entity: its type plus its name.
///
/// An entity holds at most one component per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub component_type: String,
    pub component_name: String,
}

impl ComponentKey {
    pub fn new(component_type: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            component_name: component_name.into(),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component_type, self.component_name)
    }
}

/// A named, typed data blob attached to an entity.
///
/// The payload is opaque to the core. Components are only ever replaced as
/// a whole; there is no partial-field update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub entity_id: EntityId,
    pub component_type: String,
    pub component_name: String,
    pub payload: Vec<u8>,
    /// `false` when the payload holds UTF-8 text (the `ecstring` shape).
    pub is_binary: bool,
}

impl Component {
    /// Creates a component carrying raw bytes.
    pub fn binary(
        entity_id: EntityId,
        component_type: impl Into<String>,
        component_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            entity_id,
            component_type: component_type.into(),
            component_name: component_name.into(),
            payload: payload.into(),
            is_binary: true,
        }
    }

    /// Creates a component whose payload is the UTF-8 encoding of `text`.
    pub fn text(
        entity_id: EntityId,
        component_type: impl Into<String>,
        component_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            entity_id,
            component_type: component_type.into(),
            component_name: component_name.into(),
            payload: text.into().into_bytes(),
            is_binary: false,
        }
    }

    /// Returns the key this component occupies within its entity.
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(&self.component_type, &self.component_name)
    }

    /// Returns the payload as text for text components.
    ///
    /// `None` for binary components and for text payloads that a hook has
    /// replaced with invalid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        if self.is_binary {
            return None;
        }
        std::str::from_utf8(&self.payload).ok()
    }
}

/// A world object and the components attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub components: HashMap<ComponentKey, Component>,
}

impl Entity {
    /// Creates an entity with no components.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: HashMap::new(),
        }
    }

    /// Looks up a component by key.
    pub fn component(&self, key: &ComponentKey) -> Option<&Component> {
        self.components.get(key)
    }

    /// Inserts or replaces the component at its key, returning the previous one.
    ///
    /// The component is stored under this entity even if its `entity_id`
    /// field disagrees; callers route components to the right entity.
    pub fn insert(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.key(), component)
    }

    /// Removes the component at `key`, if present.
    pub fn remove(&mut self, key: &ComponentKey) -> Option<Component> {
        self.components.remove(key)
    }

    /// Returns the components sorted by key, for stable output.
    pub fn sorted_components(&self) -> Vec<&Component> {
        let mut components: Vec<&Component> = self.components.values().collect();
        components.sort_by(|a, b| {
            (&a.component_type, &a.component_name).cmp(&(&b.component_type, &b.component_name))
        });
        components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

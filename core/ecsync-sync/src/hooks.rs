//! Per-component-type interception of writes and removals.
//!
//! Subsystems that own the meaning of a component type register hooks here
//! to validate, authorize, rewrite or react to changes before they commit.
//! The sync service only knows component type names, never the subsystems
//! behind them.
//!
//! Each type has at most one update hook and one remove hook. Registering
//! again replaces the previous hook.

use ecsync_types::{ClientId, Component, ComponentKey, EntityId};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

/// Whether a hooked change may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    Accept,
    /// Do not store and do not persist. Not an error.
    Reject,
}

impl HookVerdict {
    pub fn is_accept(self) -> bool {
        self == HookVerdict::Accept
    }
}

impl From<bool> for HookVerdict {
    fn from(accept: bool) -> Self {
        if accept {
            HookVerdict::Accept
        } else {
            HookVerdict::Reject
        }
    }
}

/// A hook that could not reach a verdict.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("hook panicked: {0}")]
    Panicked(String),
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }
}

/// What a hook returns.
pub type HookResult = Result<HookVerdict, HookError>;

/// Runs before a component of the registered type is stored.
///
/// The hook may rewrite any field of the component. Whatever it leaves
/// behind is what gets stored and persisted when it accepts.
pub trait UpdateHook: Send + Sync {
    fn on_update(&self, sender: &ClientId, component: &mut Component) -> HookResult;
}

impl<F> UpdateHook for F
where
    F: Fn(&ClientId, &mut Component) -> HookResult + Send + Sync,
{
    fn on_update(&self, sender: &ClientId, component: &mut Component) -> HookResult {
        self(sender, component)
    }
}

/// Runs before a component of the registered type is removed.
pub trait RemoveHook: Send + Sync {
    fn on_remove(&self, sender: &ClientId, entity_id: &EntityId, key: &ComponentKey) -> HookResult;
}

impl<F> RemoveHook for F
where
    F: Fn(&ClientId, &EntityId, &ComponentKey) -> HookResult + Send + Sync,
{
    fn on_remove(&self, sender: &ClientId, entity_id: &EntityId, key: &ComponentKey) -> HookResult {
        self(sender, entity_id, key)
    }
}

/// Hooks keyed by component type.
///
/// Registration normally happens while subsystems start up; dispatch only
/// takes a read lock long enough to clone the hook handle, so hooks are free
/// to call back into the registry or the sync service.
#[derive(Default)]
pub struct HookRegistry {
    update_hooks: RwLock<HashMap<String, Arc<dyn UpdateHook>>>,
    remove_hooks: RwLock<HashMap<String, Arc<dyn RemoveHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the update hook for `component_type`.
    /// Returns `true` if it replaced an earlier hook.
    pub fn register_update_hook<H>(&self, component_type: impl Into<String>, hook: H) -> bool
    where
        H: UpdateHook + 'static,
    {
        let component_type = component_type.into();
        debug!("Registering update hook for {}", component_type);
        self.update_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(component_type, Arc::new(hook))
            .is_some()
    }

    /// Registers the remove hook for `component_type`.
    /// Returns `true` if it replaced an earlier hook.
    pub fn register_remove_hook<H>(&self, component_type: impl Into<String>, hook: H) -> bool
    where
        H: RemoveHook + 'static,
    {
        let component_type = component_type.into();
        debug!("Registering remove hook for {}", component_type);
        self.remove_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(component_type, Arc::new(hook))
            .is_some()
    }

    pub fn unregister_update_hook(&self, component_type: &str) -> bool {
        self.update_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(component_type)
            .is_some()
    }

    pub fn unregister_remove_hook(&self, component_type: &str) -> bool {
        self.remove_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(component_type)
            .is_some()
    }

    pub fn has_update_hook(&self, component_type: &str) -> bool {
        self.update_hook(component_type).is_some()
    }

    pub fn has_remove_hook(&self, component_type: &str) -> bool {
        self.remove_hook(component_type).is_some()
    }

    fn update_hook(&self, component_type: &str) -> Option<Arc<dyn UpdateHook>> {
        self.update_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_type)
            .cloned()
    }

    fn remove_hook(&self, component_type: &str) -> Option<Arc<dyn RemoveHook>> {
        self.remove_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_type)
            .cloned()
    }

    /// Runs the update hook for the component's type, if any.
    ///
    /// Returns the verdict and the component as the hook left it. Without a
    /// hook the component is accepted unchanged.
    pub fn intercept_update(
        &self,
        sender: &ClientId,
        mut component: Component,
    ) -> Result<(HookVerdict, Component), HookError> {
        let Some(hook) = self.update_hook(&component.component_type) else {
            return Ok((HookVerdict::Accept, component));
        };
        let verdict = guarded(|| hook.on_update(sender, &mut component))?;
        Ok((verdict, component))
    }

    /// Runs the remove hook for `key.component_type`, if any.
    pub fn intercept_removal(
        &self,
        sender: &ClientId,
        entity_id: &EntityId,
        key: &ComponentKey,
    ) -> HookResult {
        match self.remove_hook(&key.component_type) {
            Some(hook) => guarded(|| hook.on_remove(sender, entity_id, key)),
            None => Ok(HookVerdict::Accept),
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut update: Vec<String> = self
            .update_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        let mut remove: Vec<String> = self
            .remove_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        update.sort();
        remove.sort();
        f.debug_struct("HookRegistry")
            .field("update_hooks", &update)
            .field("remove_hooks", &remove)
            .finish()
    }
}

/// Turns a panicking hook into a `HookError` for that call only.
fn guarded(call: impl FnOnce() -> HookResult) -> HookResult {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(HookError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

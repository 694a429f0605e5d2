use ecsync_sync::hooks::{HookError, HookRegistry, HookResult, HookVerdict, RemoveHook, UpdateHook};
use ecsync_types::{ClientId, Component, ComponentKey, EntityId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn accept_all(_: &ClientId, _: &mut Component) -> HookResult {
    Ok(HookVerdict::Accept)
}

/// Hook that only lets one client write.
struct OwnerOnly {
    owner: ClientId,
}

impl UpdateHook for OwnerOnly {
    fn on_update(&self, sender: &ClientId, _component: &mut Component) -> HookResult {
        Ok((*sender == self.owner).into())
    }
}

impl RemoveHook for OwnerOnly {
    fn on_remove(&self, sender: &ClientId, _: &EntityId, _: &ComponentKey) -> HookResult {
        Ok((*sender == self.owner).into())
    }
}

// ── verdict ─────────────────────────────────────────────────────

#[test]
fn verdict_from_bool() {
    assert_eq!(HookVerdict::from(true), HookVerdict::Accept);
    assert_eq!(HookVerdict::from(false), HookVerdict::Reject);
    assert!(HookVerdict::Accept.is_accept());
    assert!(!HookVerdict::Reject.is_accept());
}

// ── registration ────────────────────────────────────────────────

#[test]
fn register_and_query() {
    let registry = HookRegistry::new();
    assert!(!registry.has_update_hook("EC_Name"));

    assert!(!registry.register_update_hook("EC_Name", accept_all));

    assert!(registry.has_update_hook("EC_Name"));
    assert!(!registry.has_remove_hook("EC_Name"));
    assert!(!registry.has_update_hook("EC_Mesh"));
}

#[test]
fn registering_again_replaces_previous_hook() {
    let registry = HookRegistry::new();
    let eid = EntityId::new();
    let sender = ClientId::new();
    registry.register_update_hook("EC_Name", |_: &ClientId, _: &mut Component| -> HookResult {
        Ok(HookVerdict::Reject)
    });

    let replaced = registry.register_update_hook("EC_Name", accept_all);

    assert!(replaced);
    let (verdict, _) = registry
        .intercept_update(&sender, Component::text(eid, "EC_Name", "n", "x"))
        .unwrap();
    assert_eq!(verdict, HookVerdict::Accept);
}

#[test]
fn unregister_restores_default_accept() {
    let registry = HookRegistry::new();
    let eid = EntityId::new();
    let key = ComponentKey::new("EC_Name", "n");
    registry.register_remove_hook(
        "EC_Name",
        |_: &ClientId, _: &EntityId, _: &ComponentKey| -> HookResult { Ok(HookVerdict::Reject) },
    );

    assert!(registry.unregister_remove_hook("EC_Name"));
    assert!(!registry.unregister_remove_hook("EC_Name"));
    assert!(!registry.unregister_update_hook("EC_Name"));

    let verdict = registry.intercept_removal(&ClientId::new(), &eid, &key).unwrap();
    assert_eq!(verdict, HookVerdict::Accept);
}

#[test]
fn debug_lists_registered_types() {
    let registry = HookRegistry::new();
    registry.register_update_hook("B", accept_all);
    registry.register_update_hook("A", accept_all);

    let debug = format!("{registry:?}");
    assert!(debug.contains(r#"update_hooks: ["A", "B"]"#));
}

// ── intercept_update ────────────────────────────────────────────

#[test]
fn no_hook_accepts_unchanged() {
    let registry = HookRegistry::new();
    let component = Component::text(EntityId::new(), "EC_Name", "n", "x");

    let (verdict, out) = registry
        .intercept_update(&ClientId::new(), component.clone())
        .unwrap();

    assert_eq!(verdict, HookVerdict::Accept);
    assert_eq!(out, component);
}

#[test]
fn hook_sees_sender_and_can_reject() {
    let owner = ClientId::new();
    let registry = HookRegistry::new();
    registry.register_update_hook("EC_Name", OwnerOnly { owner });
    let component = Component::text(EntityId::new(), "EC_Name", "n", "x");

    let (by_owner, _) = registry.intercept_update(&owner, component.clone()).unwrap();
    let (by_other, _) = registry
        .intercept_update(&ClientId::new(), component)
        .unwrap();

    assert_eq!(by_owner, HookVerdict::Accept);
    assert_eq!(by_other, HookVerdict::Reject);
}

#[test]
fn hook_rewrites_component() {
    let registry = HookRegistry::new();
    registry.register_update_hook("EC_Name", |_: &ClientId, c: &mut Component| -> HookResult {
        c.payload = b"sanitized".to_vec();
        Ok(HookVerdict::Accept)
    });

    let (_, out) = registry
        .intercept_update(
            &ClientId::new(),
            Component::text(EntityId::new(), "EC_Name", "n", "<script>"),
        )
        .unwrap();

    assert_eq!(out.payload, b"sanitized");
}

#[test]
fn hook_only_runs_for_its_type() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = HookRegistry::new();
    let counter = Arc::clone(&calls);
    registry.register_update_hook("EC_Name", move |_: &ClientId, _: &mut Component| -> HookResult {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(HookVerdict::Accept)
    });

    registry
        .intercept_update(&ClientId::new(), Component::text(EntityId::new(), "EC_Mesh", "m", "x"))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_hook_returns_error() {
    let registry = HookRegistry::new();
    registry.register_update_hook("EC_Name", |_: &ClientId, _: &mut Component| -> HookResult {
        Err(HookError::failed("quota exceeded"))
    });

    let err = registry
        .intercept_update(&ClientId::new(), Component::text(EntityId::new(), "EC_Name", "n", "x"))
        .unwrap_err();

    assert!(matches!(err, HookError::Failed(ref m) if m == "quota exceeded"));
}

#[test]
fn panicking_hook_is_contained() {
    let registry = HookRegistry::new();
    registry.register_update_hook("EC_Name", |_: &ClientId, _: &mut Component| -> HookResult {
        panic!("hook blew up")
    });

    let err = registry
        .intercept_update(&ClientId::new(), Component::text(EntityId::new(), "EC_Name", "n", "x"))
        .unwrap_err();

    match err {
        HookError::Panicked(message) => assert_eq!(message, "hook blew up"),
        other => panic!("unexpected error: {other}"),
    }

    // The registry stays usable afterwards.
    registry.register_update_hook("EC_Name", accept_all);
    assert!(registry
        .intercept_update(&ClientId::new(), Component::text(EntityId::new(), "EC_Name", "n", "x"))
        .is_ok());
}

#[test]
fn panic_with_formatted_message() {
    let registry = HookRegistry::new();
    registry.register_remove_hook(
        "EC_Name",
        |_: &ClientId, _: &EntityId, key: &ComponentKey| -> HookResult {
            panic!("cannot remove {key}")
        },
    );

    let err = registry
        .intercept_removal(&ClientId::new(), &EntityId::new(), &ComponentKey::new("EC_Name", "n"))
        .unwrap_err();

    assert_eq!(err.to_string(), "hook panicked: cannot remove EC_Name/n");
}

// ── intercept_removal ───────────────────────────────────────────

#[test]
fn removal_hook_sees_key() {
    let owner = ClientId::new();
    let registry = HookRegistry::new();
    registry.register_remove_hook("EC_Light", OwnerOnly { owner });
    let key = ComponentKey::new("EC_Light", "fill");
    let eid = EntityId::new();

    assert_eq!(
        registry.intercept_removal(&owner, &eid, &key).unwrap(),
        HookVerdict::Accept
    );
    assert_eq!(
        registry.intercept_removal(&ClientId::new(), &eid, &key).unwrap(),
        HookVerdict::Reject
    );
}

#[test]
fn hook_may_reenter_registry() {
    let registry = Arc::new(HookRegistry::new());
    let inner = Arc::clone(&registry);
    registry.register_update_hook("EC_Name", move |_: &ClientId, _: &mut Component| -> HookResult {
        // Registration from inside a hook must not deadlock.
        inner.register_remove_hook("EC_Name", |_: &ClientId, _: &EntityId, _: &ComponentKey| -> HookResult {
            Ok(HookVerdict::Accept)
        });
        Ok(HookVerdict::Accept)
    });

    registry
        .intercept_update(&ClientId::new(), Component::text(EntityId::new(), "EC_Name", "n", "x"))
        .unwrap();

    assert!(registry.has_remove_hook("EC_Name"));
}

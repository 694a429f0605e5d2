use ecsync_node::{
    load_log, outbound_frames, parse_line, read_log, replay, snapshot, ComponentView,
};
use ecsync_sync::protocol::encode_update;
use ecsync_sync::{EcSyncConfig, Envelope, GenericMessage, SyncService};
use ecsync_types::{ClientId, Component, ComponentKey, EntityId};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;

fn ecstring_line(eid: &EntityId, name: &str, value: &str) -> String {
    format!(
        r#"{{"message":{{"kind":"text","method":"ecstring","args":["{eid}","EC_Name","{name}","{value}"]}}}}"#
    )
}

// ── parsing ─────────────────────────────────────────────────────

#[test]
fn parse_line_skips_blank_and_comments() {
    assert!(parse_line("").unwrap().is_none());
    assert!(parse_line("   ").unwrap().is_none());
    assert!(parse_line("# recorded 2026-10-01").unwrap().is_none());
}

#[test]
fn parse_line_reads_envelope() {
    let eid = EntityId::new();
    let envelope = parse_line(&ecstring_line(&eid, "n", "v")).unwrap().unwrap();
    assert_eq!(envelope.message.method(), "ecstring");
    assert_eq!(envelope.message.field_count(), 4);
}

#[test]
fn read_log_counts_bad_lines() {
    let eid = EntityId::new();
    let text = format!(
        "{}\nnot json\n\n# comment\n{}\n{{\"message\":{{\"kind\":\"carrier-pigeon\"}}}}\n",
        ecstring_line(&eid, "a", "1"),
        ecstring_line(&eid, "b", "2"),
    );

    let log = read_log(Cursor::new(text)).unwrap();

    assert_eq!(log.envelopes.len(), 2);
    assert_eq!(log.skipped, 2);
}

#[test]
fn load_log_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    let eid = EntityId::new();
    std::fs::write(&path, ecstring_line(&eid, "n", "v")).unwrap();

    let log = load_log(&path).unwrap();

    assert_eq!(log.envelopes.len(), 1);
    assert!(load_log(&dir.path().join("missing.jsonl")).is_err());
}

// ── replay ──────────────────────────────────────────────────────

#[tokio::test]
async fn replay_applies_messages_in_order() {
    let service = Arc::new(SyncService::in_memory());
    let eid = EntityId::new();
    let text = [
        ecstring_line(&eid, "n", "first"),
        ecstring_line(&eid, "n", "second"),
        format!(
            r#"{{"message":{{"kind":"text","method":"ecremove","args":["{eid}","EC_Name","gone"]}}}}"#
        ),
    ]
    .join("\n");
    let log = read_log(Cursor::new(text)).unwrap();

    let handled = replay(Arc::clone(&service), log.envelopes, 2).await.unwrap();

    assert_eq!(handled, 3);
    let stored = service
        .store()
        .get_component(&eid, &ComponentKey::new("EC_Name", "n"))
        .unwrap();
    assert_eq!(stored.as_text(), Some("second"));
}

#[tokio::test]
async fn replay_binary_fragments() {
    let service = Arc::new(SyncService::in_memory());
    let eid = EntityId::new();
    let component = Component::binary(eid, "EC_Mesh", "m", vec![0xab; 300]);
    let envelope = Envelope::new(ClientId::new(), encode_update(&component, 255));
    let line = serde_json::to_string(&envelope).unwrap();

    let log = read_log(Cursor::new(line)).unwrap();
    replay(Arc::clone(&service), log.envelopes, 1).await.unwrap();

    assert_eq!(
        service.store().get_component(&eid, &component.key()),
        Some(component)
    );
}

// ── snapshot ────────────────────────────────────────────────────

#[test]
fn snapshot_renders_text_and_binary() {
    let service = SyncService::in_memory();
    let eid = EntityId::new();
    service
        .save_component(&ClientId::new(), Component::text(eid, "EC_Name", "n", "hi"))
        .unwrap();
    service
        .save_component(&ClientId::new(), Component::binary(eid, "EC_Blob", "b", vec![0x0f, 0xa0]))
        .unwrap();

    let entities = snapshot(service.store(), &[]);

    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].entity_id, eid);
    assert_eq!(
        entities[0].components,
        vec![
            ComponentView {
                component_type: "EC_Blob".into(),
                component_name: "b".into(),
                is_binary: true,
                size: 2,
                text: None,
                hex: Some("0fa0".into()),
            },
            ComponentView {
                component_type: "EC_Name".into(),
                component_name: "n".into(),
                is_binary: false,
                size: 2,
                text: Some("hi".into()),
                hex: None,
            },
        ]
    );
}

#[test]
fn snapshot_filters_and_skips_unknown() {
    let service = SyncService::in_memory();
    let shown = EntityId::new();
    let hidden = EntityId::new();
    for eid in [shown, hidden] {
        let message = GenericMessage::Text {
            method: "ecstring".into(),
            args: vec![eid.to_string(), "A".into(), "b".into(), "c".into()],
        };
        assert!(service.handle_message(&ClientId::new(), &message));
    }

    let entities = snapshot(service.store(), &[shown, EntityId::new()]);

    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].entity_id, shown);
}

#[test]
fn snapshot_json_omits_absent_fields() {
    let view = ComponentView::from(&Component::text(EntityId::new(), "A", "b", "c"));
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("hex").is_none());
    assert_eq!(json["text"], "c");
}

// ── outbound frames ─────────────────────────────────────────────

#[test]
fn outbound_frames_use_configured_field_len() {
    let mut config = EcSyncConfig::default();
    config.persistence.connection = "null".into();
    config.service.max_field_len = 64;
    let service = SyncService::from_config(&config).unwrap();
    let eid = EntityId::new();
    let sender = ClientId::new();
    service
        .save_component(&sender, Component::binary(eid, "EC_Mesh", "m", vec![1u8; 130]))
        .unwrap();
    service
        .save_component(&sender, Component::text(eid, "EC_Name", "n", "hi"))
        .unwrap();

    let frames = outbound_frames(&service, &[]);

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].method(), "ecsync");
    assert_eq!(frames[0].field_count(), 6);
    assert_eq!(frames[1].method(), "ecstring");
    assert!(outbound_frames(&service, &[EntityId::new()]).is_empty());
}

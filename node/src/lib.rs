//! Message-log replay and entity snapshots for the ecsync node.
//!
//! A message log is a JSON-lines file with one [`Envelope`] per line:
//!
//! ```text
//! {"sender":"...","message":{"kind":"text","method":"ecstring","args":["<entity>","EC_Name","n","hi"]}}
//! {"message":{"kind":"binary","method":"ecsync","args":[[..],[..],[..],[1,2,3]]}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use ecsync_sync::{inbound_channel, ComponentStore, Envelope, GenericMessage, SyncService};
use ecsync_types::{Component, ComponentKey, EntityId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Envelopes read from a log, plus how many lines could not be parsed.
#[derive(Debug, Default)]
pub struct MessageLog {
    pub envelopes: Vec<Envelope>,
    pub skipped: usize,
}

/// Parses one log line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Envelope>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Reads a message log. Lines that do not parse are logged and skipped.
pub fn read_log(reader: impl BufRead) -> Result<MessageLog> {
    let mut log = MessageLog::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
        match parse_line(&line) {
            Ok(Some(envelope)) => log.envelopes.push(envelope),
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                log.skipped += 1;
            }
        }
    }
    Ok(log)
}

/// Opens and reads a message log file.
pub fn load_log(path: &Path) -> Result<MessageLog> {
    let file = File::open(path).with_context(|| format!("failed to open message log {path:?}"))?;
    let log = read_log(BufReader::new(file))?;
    info!(
        "Loaded {} messages from {:?} ({} skipped)",
        log.envelopes.len(),
        path,
        log.skipped
    );
    Ok(log)
}

/// Feeds `envelopes` through the service's inbox and waits until all of
/// them are handled. Returns the number handled.
pub async fn replay(
    service: Arc<SyncService>,
    envelopes: Vec<Envelope>,
    queue: usize,
) -> Result<usize> {
    let (tx, rx) = inbound_channel(queue);
    let server = tokio::spawn(service.serve(rx));

    for Envelope { sender, message } in envelopes {
        debug!("Replaying {} from {}", message.method(), sender);
        tx.send(sender, message).await?;
    }
    drop(tx);

    server.await.context("service loop failed")
}

/// One component as printed by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentView {
    pub component_type: String,
    pub component_name: String,
    pub is_binary: bool,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl From<&Component> for ComponentView {
    fn from(component: &Component) -> Self {
        let text = component.as_text().map(str::to_string);
        let hex = text.is_none().then(|| to_hex(&component.payload));
        Self {
            component_type: component.component_type.clone(),
            component_name: component.component_name.clone(),
            is_binary: component.is_binary,
            size: component.payload.len(),
            text,
            hex,
        }
    }
}

/// One entity as printed by the node, components sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub components: Vec<ComponentView>,
}

/// Snapshots the given entities, or every known entity when `filter` is
/// empty. Unknown entities are left out.
pub fn snapshot(store: &ComponentStore, filter: &[EntityId]) -> Vec<EntitySnapshot> {
    let ids = if filter.is_empty() {
        store.entity_ids()
    } else {
        filter.to_vec()
    };

    ids.into_iter()
        .filter_map(|id| store.get(&id))
        .map(|entity| EntitySnapshot {
            entity_id: entity.id,
            components: entity
                .sorted_components()
                .into_iter()
                .map(ComponentView::from)
                .collect(),
        })
        .collect()
}

/// Re-encodes the given entities (or every known one) as the frames a
/// client would receive, fragmented per the service's `max_field_len`.
pub fn outbound_frames(service: &SyncService, filter: &[EntityId]) -> Vec<GenericMessage> {
    let store = service.store();
    let ids = if filter.is_empty() {
        store.entity_ids()
    } else {
        filter.to_vec()
    };

    ids.iter()
        .filter_map(|id| store.get(id))
        .flat_map(|entity| {
            let keys: Vec<ComponentKey> = entity
                .sorted_components()
                .into_iter()
                .map(Component::key)
                .collect();
            keys.into_iter()
                .filter_map(move |key| service.encode_component(&entity.id, &key))
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

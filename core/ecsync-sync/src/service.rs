//! Sync service: decode → hooks → in-memory store → write-through.
//!
//! The host drives the service explicitly. It calls [`SyncService::attach`]
//! and [`SyncService::detach`] as regions come and go, and hands every
//! inbound generic message to [`SyncService::handle_message`] (or feeds an
//! [`inbound_channel`] that [`SyncService::serve`] drains).
//!
//! The in-memory store is authoritative at runtime. Persistence is
//! best-effort durability: a failed write is logged and reported in the
//! outcome, the in-memory change stays.

use crate::config::EcSyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::hooks::HookRegistry;
use crate::protocol::{
    decode, encode_update, ComponentRemoval, ComponentRequest, Envelope, GenericMessage,
    DEFAULT_MAX_FIELD_LEN,
};
use crate::store::ComponentStore;
use ecsync_storage::{open_adapter, NullPersistence, PersistenceAdapter, StorageError};
use ecsync_types::{ClientId, Component, ComponentKey, EntityId, RegionId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A world region as seen by the sync service.
pub trait RegionContext: Send + Sync {
    fn region_id(&self) -> RegionId;

    /// Entities already present in the region when it is attached.
    fn entity_ids(&self) -> Vec<EntityId>;
}

/// A region described by a fixed list of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRegion {
    pub id: RegionId,
    pub entities: Vec<EntityId>,
}

impl StaticRegion {
    pub fn new(id: RegionId, entities: Vec<EntityId>) -> Self {
        Self { id, entities }
    }
}

impl RegionContext for StaticRegion {
    fn region_id(&self) -> RegionId {
        self.id
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.clone()
    }
}

/// Result of an update that made it past decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored in memory; `persisted` is false when the durable write failed.
    Applied { persisted: bool },
    /// A hook said no. Nothing was stored or persisted.
    Rejected,
}

/// Result of a removal that made it past decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// `existed` tells whether the in-memory store held the component.
    Applied { existed: bool, persisted: bool },
    Rejected,
}

/// Result of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Update(WriteOutcome),
    Removal(RemoveOutcome),
    /// Not a component message, or too short to be one.
    Ignored,
}

impl MessageOutcome {
    /// False only when a durable write or delete failed.
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            MessageOutcome::Update(WriteOutcome::Applied { persisted: false })
                | MessageOutcome::Removal(RemoveOutcome::Applied { persisted: false, .. })
        )
    }
}

/// Sending half of a service inbox.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::Sender<Envelope>,
}

impl InboundSender {
    /// Queues a message, waiting for room if the inbox is full.
    pub async fn send(&self, sender: ClientId, message: GenericMessage) -> SyncResult<()> {
        self.tx
            .send(Envelope::new(sender, message))
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

/// Creates an inbox for [`SyncService::serve`].
pub fn inbound_channel(capacity: usize) -> (InboundSender, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (InboundSender { tx }, rx)
}

/// Keeps the component store in sync with clients and the durable backend.
pub struct SyncService {
    store: Arc<ComponentStore>,
    hooks: Arc<HookRegistry>,
    persistence: Arc<dyn PersistenceAdapter>,
    regions: Mutex<HashSet<RegionId>>,
    /// Held across each memory write and its durable write, so both end
    /// on the same last writer.
    write_through: Mutex<()>,
    max_field_len: usize,
}

impl SyncService {
    /// Creates a service over explicitly provided parts.
    pub fn new(
        store: Arc<ComponentStore>,
        hooks: Arc<HookRegistry>,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        Self {
            store,
            hooks,
            persistence,
            regions: Mutex::new(HashSet::new()),
            write_through: Mutex::new(()),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    /// Sets the fragment size used by [`SyncService::encode_component`].
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len.max(1);
        self
    }

    /// Creates a purely in-memory service with persistence disabled.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(ComponentStore::new()),
            Arc::new(HookRegistry::new()),
            Arc::new(NullPersistence),
        )
    }

    /// Creates a service with fresh store and registry and the adapter the
    /// config selects.
    pub fn from_config(config: &EcSyncConfig) -> SyncResult<Self> {
        let persistence = open_adapter(&config.persistence)?;
        Ok(Self::new(
            Arc::new(ComponentStore::new()),
            Arc::new(HookRegistry::new()),
            persistence,
        )
        .with_max_field_len(config.service.max_field_len))
    }

    pub fn store(&self) -> &Arc<ComponentStore> {
        &self.store
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn persistence(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.persistence
    }

    pub fn max_field_len(&self) -> usize {
        self.max_field_len
    }

    fn regions(&self) -> MutexGuard<'_, HashSet<RegionId>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_through(&self) -> MutexGuard<'_, ()> {
        self.write_through.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Region lifecycle ─────────────────────────────────────────

    /// Attaches a region and hydrates the store from persistence.
    ///
    /// Returns how many components were loaded. Entities whose load fails
    /// are logged and skipped, except when the adapter itself is unusable
    /// (a poisoned lock): then the region is left unattached and the error
    /// returned, so the host can retry. Attaching a region twice is a no-op.
    pub fn attach(&self, region: &dyn RegionContext) -> SyncResult<usize> {
        let region_id = region.region_id();
        if !self.regions().insert(region_id) {
            warn!("Region {} is already attached", region_id);
            return Ok(0);
        }

        let mut hydrated = 0;
        for entity_id in region.entity_ids() {
            match self.persistence.load_all(&entity_id) {
                Ok(components) => hydrated += self.store.seed(components),
                Err(e @ StorageError::Lock(_)) => {
                    self.regions().remove(&region_id);
                    error!(
                        "Failed to attach region {}: {} is unusable: {}",
                        region_id,
                        self.persistence.name(),
                        e
                    );
                    return Err(e.into());
                }
                Err(e) => warn!(
                    "Failed to load components for entity {} in region {}: {}",
                    entity_id, region_id, e
                ),
            }
        }

        info!(
            "Attached region {} ({} components hydrated from {})",
            region_id,
            hydrated,
            self.persistence.name()
        );
        Ok(hydrated)
    }

    /// Detaches a region. Every change was already written through, so
    /// nothing is flushed. Returns whether the region was attached.
    pub fn detach(&self, region_id: &RegionId) -> bool {
        let removed = self.regions().remove(region_id);
        if removed {
            info!("Detached region {}", region_id);
        }
        removed
    }

    pub fn is_attached(&self, region_id: &RegionId) -> bool {
        self.regions().contains(region_id)
    }

    pub fn attached_regions(&self) -> Vec<RegionId> {
        let mut regions: Vec<RegionId> = self.regions().iter().copied().collect();
        regions.sort();
        regions
    }

    // ── Component operations ─────────────────────────────────────

    /// Runs the update hook, stores the result and writes it through.
    pub fn save_component(&self, sender: &ClientId, component: Component) -> SyncResult<WriteOutcome> {
        let entity_id = component.entity_id;
        let key = component.key();
        let (verdict, component) = self
            .hooks
            .intercept_update(sender, component)
            .map_err(|source| SyncError::Hook {
                entity_id,
                key: key.clone(),
                source,
            })?;

        if !verdict.is_accept() {
            debug!("Update of {} on entity {} rejected by hook", key, entity_id);
            return Ok(WriteOutcome::Rejected);
        }

        // The hook may have moved the component to another entity or key.
        let _ordered = self.write_through();
        self.store.upsert(component.clone());
        let persisted = match self.persistence.store(&component) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to persist {} on entity {}: {}",
                    component.key(),
                    component.entity_id,
                    e
                );
                false
            }
        };

        debug!("Saved {} on entity {}", component.key(), component.entity_id);
        Ok(WriteOutcome::Applied { persisted })
    }

    /// Runs the remove hook, removes from the store and deletes durably.
    pub fn remove_component(
        &self,
        sender: &ClientId,
        entity_id: &EntityId,
        key: &ComponentKey,
    ) -> SyncResult<RemoveOutcome> {
        let verdict = self
            .hooks
            .intercept_removal(sender, entity_id, key)
            .map_err(|source| SyncError::Hook {
                entity_id: *entity_id,
                key: key.clone(),
                source,
            })?;

        if !verdict.is_accept() {
            debug!("Removal of {} on entity {} rejected by hook", key, entity_id);
            return Ok(RemoveOutcome::Rejected);
        }

        let _ordered = self.write_through();
        let existed = self.store.remove(entity_id, key);
        let persisted = match self.persistence.remove(entity_id, key) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to delete {} on entity {}: {}", key, entity_id, e);
                false
            }
        };

        debug!("Removed {} on entity {} (existed: {})", key, entity_id, existed);
        Ok(RemoveOutcome::Applied { existed, persisted })
    }

    /// Encodes the stored component under `key` as an outbound frame, cut
    /// into fragments of the configured size. `None` when absent.
    pub fn encode_component(&self, entity_id: &EntityId, key: &ComponentKey) -> Option<GenericMessage> {
        self.store
            .get_component(entity_id, key)
            .map(|component| encode_update(&component, self.max_field_len))
    }

    // ── Inbound messages ─────────────────────────────────────────

    /// Decodes and applies one message.
    pub fn process_message(
        &self,
        sender: &ClientId,
        message: &GenericMessage,
    ) -> SyncResult<MessageOutcome> {
        match decode(message)? {
            Some(ComponentRequest::Update(component)) => {
                self.save_component(sender, component).map(MessageOutcome::Update)
            }
            Some(ComponentRequest::Removal(ComponentRemoval { entity_id, key })) => self
                .remove_component(sender, &entity_id, &key)
                .map(MessageOutcome::Removal),
            None => Ok(MessageOutcome::Ignored),
        }
    }

    /// Processes one message and reduces the result to success/failure.
    ///
    /// Errors are logged here and never escape, so one bad message cannot
    /// affect any other.
    pub fn handle_message(&self, sender: &ClientId, message: &GenericMessage) -> bool {
        match self.process_message(sender, message) {
            Ok(outcome) => outcome.is_success(),
            Err(e) => {
                error!(
                    "Failed to handle {} message from {}: {}",
                    message.method(),
                    sender,
                    e
                );
                false
            }
        }
    }

    /// Drains `inbox` until every sender is dropped. Each message runs on
    /// the blocking pool, since persistence may block.
    ///
    /// Returns the number of messages handled.
    pub async fn serve(self: Arc<Self>, mut inbox: mpsc::Receiver<Envelope>) -> usize {
        let mut handled = 0;
        while let Some(Envelope { sender, message }) = inbox.recv().await {
            let service = Arc::clone(&self);
            let result =
                tokio::task::spawn_blocking(move || service.handle_message(&sender, &message)).await;
            if let Err(e) = result {
                error!("Message handler task failed: {}", e);
            }
            handled += 1;
        }
        debug!("Inbox closed after {} messages", handled);
        handled
    }
}

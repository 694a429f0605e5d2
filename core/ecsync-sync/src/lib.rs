//! Entity-component sync core.
//!
//! Keeps a server-side index of entity components in step with client
//! messages and a durable store.
//!
//! # Architecture
//!
//! - **Protocol**: decodes `ecsync`, `ecstring` and `ecremove` generic
//!   messages into component requests (and encodes outbound ones)
//! - **Hooks**: per-component-type interception of updates and removals
//! - **Store**: the in-memory entity → component index
//! - **Service**: runs every request through hooks, store and persistence
//!
//! ## Message flow
//!
//! 1. **Decode**: unknown or short messages are ignored
//! 2. **Intercept**: the hook for the component type may rewrite or reject
//! 3. **Apply**: the in-memory store is updated
//! 4. **Write through**: the change goes to the persistence adapter
//!
//! # Example
//!
//! ```
//! use ecsync_sync::{GenericMessage, SyncService};
//! use ecsync_types::{ClientId, ComponentKey, EntityId};
//!
//! let service = SyncService::in_memory();
//! let entity = EntityId::new();
//! let message = GenericMessage::Text {
//!     method: "ecstring".to_string(),
//!     args: vec![entity.to_string(), "Label".into(), "title".into(), "hello".into()],
//! };
//!
//! assert!(service.handle_message(&ClientId::new(), &message));
//! let stored = service
//!     .store()
//!     .get_component(&entity, &ComponentKey::new("Label", "title"))
//!     .unwrap();
//! assert_eq!(stored.payload, b"hello");
//! ```

pub mod config;
mod error;
pub mod hooks;
pub mod protocol;
mod service;
mod store;

pub use config::{EcSyncConfig, ServiceConfig};
pub use error::{SyncError, SyncResult};
pub use hooks::{HookError, HookRegistry, HookResult, HookVerdict, RemoveHook, UpdateHook};
pub use protocol::{
    decode, encode_removal, encode_update, ComponentRemoval, ComponentRequest, DecodeError,
    Envelope, GenericMessage,
};
pub use service::{
    inbound_channel, InboundSender, MessageOutcome, RegionContext, RemoveOutcome, StaticRegion,
    SyncService, WriteOutcome,
};
pub use store::ComponentStore;

//! Error types for the sync layer.

use crate::hooks::HookError;
use crate::protocol::DecodeError;
use ecsync_types::{ComponentKey, EntityId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while processing a message or building the service.
///
/// Hook rejections are not errors; they come back as `Rejected` outcomes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The frame was recognized but could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A registered hook failed or panicked.
    #[error("hook for {key} on entity {entity_id} failed: {source}")]
    Hook {
        entity_id: EntityId,
        key: ComponentKey,
        #[source]
        source: HookError,
    },

    /// Storage error while opening or hydrating.
    #[error("storage error: {0}")]
    Storage(#[from] ecsync_storage::StorageError),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

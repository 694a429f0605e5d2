//! Core type definitions for ecsync.
//!
//! This crate defines the plain data types shared by the storage and sync
//! layers:
//! - Entity, client and region identifiers (UUID newtypes)
//! - [`ComponentKey`] and [`Component`], the named, typed payload blobs
//! - [`Entity`], the per-entity component set
//!
//! Payload bytes are opaque here. Their meaning belongs to whichever
//! subsystem registered hooks for a component type.

mod component;
mod ids;

pub use component::{Component, ComponentKey, Entity};
pub use ids::{ClientId, EntityId, RegionId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}

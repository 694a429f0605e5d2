//! Identifier types used throughout ecsync.
//!
//! All identifiers wrap a 128-bit UUID. Fresh ids use UUID v7 so that ids
//! minted by this process sort by creation time; ids arriving from the wire
//! may be any UUID version.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new id with the current timestamp.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an id from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an id from any UUID text form (hyphenated, simple,
            /// braced or URN). Surrounding whitespace is ignored.
            pub fn parse(s: &str) -> Result<Self> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier of a world entity that owns components.
    EntityId
}

uuid_id! {
    /// Identity of the remote client a message came from.
    ///
    /// Hooks receive it so they can make authorization decisions.
    ClientId
}

uuid_id! {
    /// Identity of a world region the sync service can attach to.
    RegionId
}

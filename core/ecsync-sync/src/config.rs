//! Service configuration, read from a TOML file.
//!
//! ```toml
//! [persistence]
//! connection = "ecdata.db"   # path, ":memory:", or "null"
//!
//! [service]
//! inbound_queue = 256
//! max_field_len = 255
//! ```

use crate::error::{SyncError, SyncResult};
use crate::protocol::DEFAULT_MAX_FIELD_LEN;
use ecsync_storage::PersistenceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcSyncConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Settings for hosts driving the service over a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capacity of the inbound message channel.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
    /// Largest field produced when encoding outbound binary updates.
    #[serde(default = "default_max_field_len")]
    pub max_field_len: usize,
}

fn default_inbound_queue() -> usize {
    256
}

fn default_max_field_len() -> usize {
    DEFAULT_MAX_FIELD_LEN
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            inbound_queue: default_inbound_queue(),
            max_field_len: default_max_field_len(),
        }
    }
}

impl EcSyncConfig {
    /// Parses a config from TOML text.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file, falling back to defaults.
    ///
    /// A missing file is normal. An unreadable or invalid file is logged and
    /// the defaults are used instead, so a broken config never keeps the
    /// service from starting.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> SyncResult<()> {
        if self.service.inbound_queue == 0 {
            return Err(SyncError::Config("service.inbound_queue must be at least 1".into()));
        }
        if self.service.max_field_len == 0 {
            return Err(SyncError::Config("service.max_field_len must be at least 1".into()));
        }
        if self.persistence.connection.trim().is_empty() {
            return Err(SyncError::Config("persistence.connection must not be empty".into()));
        }
        Ok(())
    }
}

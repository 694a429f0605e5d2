//! Adapter selection.

use crate::adapter::{NullPersistence, PersistenceAdapter};
use crate::error::StorageResult;
use crate::sqlite::SqliteComponentStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Connection used when none is configured.
pub const DEFAULT_CONNECTION: &str = "ecdata.db";

/// Connection value that switches persistence off.
pub const DISABLED_CONNECTION: &str = "null";

const IN_MEMORY_CONNECTION: &str = ":memory:";

/// Persistence settings, usually the `[persistence]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// A database path, `":memory:"`, or `"null"` to disable persistence.
    #[serde(default = "default_connection")]
    pub connection: String,
}

fn default_connection() -> String {
    DEFAULT_CONNECTION.to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
        }
    }
}

impl PersistenceConfig {
    /// Config with persistence switched off.
    pub fn disabled() -> Self {
        Self {
            connection: DISABLED_CONNECTION.to_string(),
        }
    }

    /// Interprets the connection value.
    pub fn backend(&self) -> Backend {
        let connection = self.connection.trim();
        if connection.eq_ignore_ascii_case(DISABLED_CONNECTION) {
            Backend::Disabled
        } else if connection == IN_MEMORY_CONNECTION {
            Backend::InMemory
        } else {
            Backend::Sqlite(PathBuf::from(connection))
        }
    }
}

/// Where components are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Disabled,
    /// SQLite database that lives as long as the adapter.
    InMemory,
    Sqlite(PathBuf),
}

/// Opens the adapter selected by `config`.
pub fn open_adapter(config: &PersistenceConfig) -> StorageResult<Arc<dyn PersistenceAdapter>> {
    let adapter: Arc<dyn PersistenceAdapter> = match config.backend() {
        Backend::Disabled => Arc::new(NullPersistence),
        Backend::InMemory => Arc::new(SqliteComponentStore::open_in_memory()?),
        Backend::Sqlite(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteComponentStore::open(&path)?)
        }
    };
    info!("Component persistence: {} ({})", adapter.name(), config.connection);
    Ok(adapter)
}

//! SQLite-backed component persistence.

use crate::adapter::PersistenceAdapter;
use crate::error::{StorageError, StorageResult};
use ecsync_types::{Component, ComponentKey, EntityId};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Component store backed by a single SQLite table.
pub struct SqliteComponentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteComponentStore {
    /// Opens (or creates) a component database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::open_with_conn(Arc::new(Mutex::new(conn)))
    }

    /// Opens an in-memory database (for testing and ephemeral hosts).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::open_with_conn(Arc::new(Mutex::new(conn)))
    }

    /// Wraps an existing shared connection and makes sure the schema exists.
    pub fn open_with_conn(conn: Arc<Mutex<Connection>>) -> StorageResult<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("component db mutex poisoned: {e}")))
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS ec_components (
                entity_id TEXT NOT NULL,
                component_type TEXT NOT NULL,
                component_name TEXT NOT NULL,
                data BLOB NOT NULL,
                is_binary INTEGER NOT NULL,
                PRIMARY KEY (entity_id, component_type, component_name)
            );
            ",
        )?;
        Ok(())
    }

    /// Returns the ids of all entities with at least one persisted component.
    pub fn entity_ids(&self) -> StorageResult<Vec<EntityId>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT entity_id FROM ec_components ORDER BY entity_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(parse_entity_id(&row?)?);
        }
        Ok(result)
    }

    /// Returns the total number of persisted components.
    pub fn component_count(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ec_components", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl PersistenceAdapter for SqliteComponentStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load_all(&self, entity_id: &EntityId) -> StorageResult<Vec<Component>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT component_type, component_name, data, is_binary FROM ec_components
             WHERE entity_id = ?1 ORDER BY component_type, component_name",
        )?;
        let rows = stmt.query_map(params![entity_id.to_string()], |row| {
            Ok(Component {
                entity_id: *entity_id,
                component_type: row.get(0)?,
                component_name: row.get(1)?,
                payload: row.get(2)?,
                is_binary: row.get(3)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        debug!("Loaded {} components for entity {}", result.len(), entity_id);
        Ok(result)
    }

    fn store(&self, component: &Component) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO ec_components
                (entity_id, component_type, component_name, data, is_binary)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                component.entity_id.to_string(),
                component.component_type,
                component.component_name,
                component.payload,
                component.is_binary,
            ],
        )?;
        Ok(())
    }

    fn remove(&self, entity_id: &EntityId, key: &ComponentKey) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM ec_components
             WHERE entity_id = ?1 AND component_type = ?2 AND component_name = ?3",
            params![entity_id.to_string(), key.component_type, key.component_name],
        )?;
        Ok(())
    }
}

fn parse_entity_id(s: &str) -> StorageResult<EntityId> {
    EntityId::parse(s).map_err(|e| StorageError::InvalidData(format!("invalid entity_id {s:?}: {e}")))
}

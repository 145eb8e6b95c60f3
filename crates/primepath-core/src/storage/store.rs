//! Snapshot key-value stores.
//!
//! The persistence contract is a plain string key-value store; the browser
//! original used local storage. [`SqliteStore`] is the durable default and
//! [`MemoryStore`] backs tests and embedders that want no disk I/O.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::StoreError;

use super::data_dir;

/// String key-value store for timer snapshots.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Safe to call when the key does not exist.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// SQLite-backed store at `~/.config/primepath/primepath.db`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the default store, creating the schema if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::OpenFailed {
            path: "~/.config/primepath".into(),
            source: rusqlite::Error::InvalidPath(e.to_string().into()),
        })?;
        Self::open(dir.join("primepath.db"))
    }

    /// Open a store at an explicit path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS timer_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }
}

impl SnapshotStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn
            .prepare("SELECT value FROM timer_state WHERE key = ?1")
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        match stmt.query_row(params![key], |row| row.get::<_, String>(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(e.to_string())),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO timer_state (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute("DELETE FROM timer_state WHERE key = ?1", params![key])
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_get_put_delete() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get("exam_timer:s1").unwrap().is_none());
        store.put("exam_timer:s1", "{\"x\":1}").unwrap();
        assert_eq!(store.get("exam_timer:s1").unwrap().unwrap(), "{\"x\":1}");
        store.put("exam_timer:s1", "{\"x\":2}").unwrap();
        assert_eq!(store.get("exam_timer:s1").unwrap().unwrap(), "{\"x\":2}");
        store.delete("exam_timer:s1").unwrap();
        assert!(store.get("exam_timer:s1").unwrap().is_none());
    }

    #[test]
    fn sqlite_delete_missing_key_is_ok() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.delete("never-written").is_ok());
    }

    #[test]
    fn sqlite_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("k", "v").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), "v");
    }

    #[test]
    fn memory_store_behaves_like_sqlite() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.put("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.delete("a").is_ok());
    }
}

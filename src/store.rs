use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Shared handle to a store; every repository of one board holds a clone.
pub type SharedStore = Rc<dyn KeyValueStore>;

/// A string-keyed store of string values.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Atomically replaces the value at `key` with what `f` returns for the
    /// current value. `None` in or out means the key is absent. An error from
    /// `f` leaves the stored value untouched.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()>;

    /// Reports whether somebody else committed to the store since the last
    /// call. Stores nobody else can see never change behind our back.
    fn changed_externally(&self) -> Result<bool> {
        Ok(false)
    }
}

// --- Durable store ---

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    data_version: Cell<i64>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, path.to_path_buf())
    }

    pub fn open_default(config: &Config) -> Result<Self> {
        Self::open(&config.db_path)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        // Another process may hold the write lock for a moment.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn,
            path,
            data_version: Cell::new(0),
        };
        store.init()?;
        store.data_version.set(store.current_data_version()?);
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    fn current_data_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?)
    }

    fn write_value(conn: &Connection, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                conn.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                    params![key, value],
                )?;
            }
            None => {
                conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            }
        }
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, bytes = value.len(), "store write");
        Self::write_value(&self.conn, key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        debug!(key, "store remove");
        Self::write_value(&self.conn, key, None)
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        // IMMEDIATE takes the write lock before reading, so no other
        // connection can commit between our read and our write.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        let next = f(current)?;
        debug!(key, removed = next.is_none(), "store update");
        Self::write_value(&tx, key, next.as_deref())?;
        tx.commit()?;
        Ok(())
    }

    fn changed_externally(&self) -> Result<bool> {
        let version = self.current_data_version()?;
        let changed = version != self.data_version.get();
        self.data_version.set(version);
        Ok(changed)
    }
}

// --- Ephemeral store ---

/// Lives as long as the session that owns it.
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let current = self.get(key)?;
        match f(current)? {
            Some(value) => self.set(key, &value),
            None => self.remove(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_get_set_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("jobs").unwrap(), None);

        store.set("jobs", "[]").unwrap();
        assert_eq!(store.get("jobs").unwrap().as_deref(), Some("[]"));

        store.set("jobs", "[1]").unwrap();
        assert_eq!(store.get("jobs").unwrap().as_deref(), Some("[1]"));

        store.remove("jobs").unwrap();
        assert_eq!(store.get("jobs").unwrap(), None);
    }

    #[test]
    fn test_update_failure_leaves_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("users", "old").unwrap();

        let result = store.update("users", &mut |_| {
            Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
        });
        assert!(result.is_err());
        assert_eq!(store.get("users").unwrap().as_deref(), Some("old"));

        store
            .update("users", &mut |current| {
                Ok(current.map(|v| format!("{}-new", v)))
            })
            .unwrap();
        assert_eq!(store.get("users").unwrap().as_deref(), Some("old-new"));

        store.update("users", &mut |_| Ok(None)).unwrap();
        assert_eq!(store.get("users").unwrap(), None);
    }

    #[test]
    fn test_changed_externally_sees_other_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.db");
        let tab_a = SqliteStore::open(&path).unwrap();
        let tab_b = SqliteStore::open(&path).unwrap();

        assert!(!tab_a.changed_externally().unwrap());

        // Our own writes are not external changes.
        tab_a.set("currentUser", "null").unwrap();
        assert!(!tab_a.changed_externally().unwrap());

        tab_b.set("currentUser", "{}").unwrap();
        assert!(tab_a.changed_externally().unwrap());
        assert!(!tab_a.changed_externally().unwrap());
        assert_eq!(tab_a.get("currentUser").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("searchedTitles", "[\"rust\"]").unwrap();
        assert_eq!(store.len(), 1);
        store
            .update("searchedTitles", &mut |_| Ok(Some("[]".to_string())))
            .unwrap();
        assert_eq!(store.get("searchedTitles").unwrap().as_deref(), Some("[]"));
        assert!(!store.changed_externally().unwrap());
        store.clear();
        assert_eq!(store.len(), 0);
    }
}

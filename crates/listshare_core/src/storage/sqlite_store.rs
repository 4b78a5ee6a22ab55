//! SQLite-backed `KvStore` over the `kv_entries` table.
//!
//! # Invariants
//! - The wrapped connection has migrations applied (see `db::open_db`).
//! - `set` is an upsert; `updated_at` tracks the last write in epoch ms.

use super::{KvStore, StorageError, StorageResult};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Durable key-value store for one device.
///
/// The connection sits behind a mutex so the store can be shared across
/// threads. Each call is its own statement; there is no multi-call
/// transaction, so read-modify-write sequences stay last-write-wins.
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens the database file at `path`, creating and migrating it as needed.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Counts stored entries whose key starts with `prefix`.
    pub fn count_with_prefix(&self, prefix: &str) -> StorageResult<u64> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let pattern = format!("{}%", escape_like(prefix));
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE key LIKE ?1 ESCAPE '\\';",
            [pattern],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_like, SqliteKvStore};
    use crate::storage::KvStore;

    #[test]
    fn set_overwrites_existing_value() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.remove("never-set").unwrap();
        assert!(store.get("never-set").unwrap().is_none());
    }

    #[test]
    fn count_with_prefix_treats_underscore_literally() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("lists_a", "[]").unwrap();
        store.set("lists_b", "[]").unwrap();
        store.set("listsXc", "[]").unwrap();
        assert_eq!(store.count_with_prefix("lists_").unwrap(), 2);
        assert_eq!(escape_like("a_b%"), "a\\_b\\%");
    }
}

//! SQLite-backed store.
//!
//! Records live in a single table keyed by the encoded key; the property
//! list is stored as a JSON array so typed values (timestamps, keys)
//! survive a round trip.

use crate::{KvStore, StorageError, StorageResult, Transaction};
use chrono::Utc;
use docstack_types::{Key, Property};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Persistent store for records backed by SQLite.
///
/// One connection sits behind a mutex; a transaction holds the lock from
/// `BEGIN IMMEDIATE` until commit or rollback, so transactions on the same
/// store are serialized. Another process holding the write lock surfaces
/// as [`StorageError::Conflict`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                parent TEXT,
                properties TEXT NOT NULL,
                written_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS records_kind ON records(kind);
            CREATE INDEX IF NOT EXISTS records_parent ON records(parent);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: &str) -> StorageResult<usize> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = ?1",
            params![kind],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Keys of records stored directly under `parent`, oldest write first.
    pub fn children(&self, parent: &Key) -> StorageResult<Vec<Key>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT key FROM records WHERE parent = ?1 ORDER BY written_at, key")?;
        let rows = stmt.query_map(params![parent.encode()], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for encoded in rows {
            keys.push(Key::decode(&encoded?)?);
        }
        Ok(keys)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(conn: &Connection, key: &Key) -> StorageResult<Option<Vec<Property>>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT properties FROM records WHERE key = ?1",
            params![key.encode()],
            |row| row.get(0),
        )
        .optional()?;
    json.map(|s| serde_json::from_str(&s).map_err(StorageError::from))
        .transpose()
}

fn busy_to_conflict(err: rusqlite::Error, key: &str) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            warn!(key = %key, "Database is locked by another writer");
            StorageError::Conflict(key.to_string())
        }
        _ => StorageError::Database(err),
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &Key) -> StorageResult<Vec<Property>> {
        let conn = self.lock();
        load(&conn, key)?.ok_or_else(|| StorageError::NotFound(key.encode()))
    }

    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        let conn = self.lock();
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| busy_to_conflict(e, "<begin>"))?;
        debug!("Began SQLite transaction");
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Transaction for SqliteTransaction<'_> {
    fn get(&mut self, key: &Key) -> StorageResult<Option<Vec<Property>>> {
        load(&self.conn, key)
    }

    fn put(&mut self, key: &Key, properties: &[Property]) -> StorageResult<Key> {
        let json = serde_json::to_string(properties)?;
        self.conn.execute(
            "INSERT INTO records (key, kind, parent, properties, written_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                properties = excluded.properties,
                written_at = excluded.written_at",
            params![
                key.encode(),
                key.kind(),
                key.parent().map(Key::encode),
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(key.clone())
    }

    fn delete(&mut self, key: &Key) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM records WHERE key = ?1", params![key.encode()])?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| busy_to_conflict(e, "<commit>"))?;
        self.finished = true;
        debug!("Committed SQLite transaction");
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Rollback failed");
            } else {
                debug!("Rolled back SQLite transaction");
            }
        }
    }
}

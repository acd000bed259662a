//! Transactional key-value storage for docstack.
//!
//! # Architecture
//!
//! - [`KvStore`] opens [`Transaction`]s; every multi-key write goes through
//!   one, and dropping a transaction without committing rolls it back
//! - [`MemoryStore`] keeps records in process memory and detects
//!   concurrent modification of anything a transaction read
//! - [`SqliteStore`] persists records as JSON rows and relies on SQLite's
//!   own transactions

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use docstack_types::{Key, Property};

/// A store of property lists addressed by [`Key`].
pub trait KvStore: Send + Sync {
    /// Reads the committed record under `key`.
    fn get(&self, key: &Key) -> StorageResult<Vec<Property>>;

    /// Starts a transaction. Nothing it writes is visible until
    /// [`Transaction::commit`] succeeds.
    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>>;

    /// A fresh key with a generated id for `kind`.
    fn new_incomplete_key(&self, kind: &str) -> Key {
        Key::generated(kind)
    }

    fn decode_key(&self, encoded: &str) -> StorageResult<Key> {
        Ok(Key::decode(encoded)?)
    }
}

/// An open, all-or-nothing unit of work.
pub trait Transaction {
    /// Reads `key`, seeing this transaction's own writes. `None` if absent.
    fn get(&mut self, key: &Key) -> StorageResult<Option<Vec<Property>>>;

    /// Stores `properties` under `key`, replacing any previous record.
    fn put(&mut self, key: &Key, properties: &[Property]) -> StorageResult<Key>;

    fn delete(&mut self, key: &Key) -> StorageResult<()>;

    /// Applies every write atomically. Fails with
    /// [`StorageError::Conflict`] if a concurrent writer got there first.
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// Runs `f` inside a transaction and commits if it returns `Ok`.
///
/// On `Err` the transaction is dropped, which rolls it back.
pub fn run_in_transaction<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: KvStore + ?Sized,
    E: From<StorageError>,
    F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
{
    let mut tx = store.begin()?;
    let out = f(tx.as_mut())?;
    tx.commit()?;
    Ok(out)
}

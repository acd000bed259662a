//! In-process store with optimistic concurrency control.

use crate::{KvStore, StorageError, StorageResult, Transaction};
use docstack_types::{Key, Property};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Default)]
struct Inner {
    records: HashMap<String, Vec<Property>>,
    /// Last write revision per encoded key. Entries survive deletion so a
    /// delete still counts as a modification, until no transaction that
    /// could have read the key is left open.
    revisions: HashMap<String, u64>,
    clock: u64,
    open_transactions: usize,
}

impl Inner {
    fn revision(&self, id: &str) -> u64 {
        self.revisions.get(id).copied().unwrap_or(0)
    }

    /// Forgets revisions of deleted keys.
    fn prune(&mut self) {
        let Inner {
            records, revisions, ..
        } = self;
        let before = revisions.len();
        revisions.retain(|id, _| records.contains_key(id));
        if revisions.len() < before {
            debug!(pruned = before - revisions.len(), "Pruned revisions of deleted keys");
        }
    }
}

/// Records held in memory.
///
/// A transaction remembers the revision of every key it reads. Commit
/// takes the store lock, verifies none of those revisions moved and then
/// applies all buffered writes at once; otherwise it fails with
/// [`StorageError::Conflict`] and applies nothing.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of committed records of `kind`.
    pub fn count(&self, kind: &str) -> StorageResult<usize> {
        let inner = self.lock();
        let mut count = 0;
        for id in inner.records.keys() {
            if Key::decode(id)?.kind() == kind {
                count += 1;
            }
        }
        Ok(count)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &Key) -> StorageResult<Vec<Property>> {
        let id = key.encode();
        self.lock()
            .records
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        self.lock().open_transactions += 1;
        Ok(Box::new(MemoryTransaction {
            store: self,
            reads: HashMap::new(),
            writes: Vec::new(),
        }))
    }
}

enum Write {
    Put(String, Vec<Property>),
    Delete(String),
}

impl Write {
    fn id(&self) -> &str {
        match self {
            Self::Put(id, _) | Self::Delete(id) => id,
        }
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    reads: HashMap<String, u64>,
    writes: Vec<Write>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &Key) -> StorageResult<Option<Vec<Property>>> {
        let id = key.encode();
        if let Some(write) = self.writes.iter().rev().find(|w| w.id() == id) {
            return Ok(match write {
                Write::Put(_, props) => Some(props.clone()),
                Write::Delete(_) => None,
            });
        }

        let inner = self.store.lock();
        let revision = inner.revision(&id);
        let found = inner.records.get(&id).cloned();
        drop(inner);

        self.reads.entry(id).or_insert(revision);
        Ok(found)
    }

    fn put(&mut self, key: &Key, properties: &[Property]) -> StorageResult<Key> {
        self.writes.push(Write::Put(key.encode(), properties.to_vec()));
        Ok(key.clone())
    }

    fn delete(&mut self, key: &Key) -> StorageResult<()> {
        self.writes.push(Write::Delete(key.encode()));
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let reads = std::mem::take(&mut self.reads);
        let writes = std::mem::take(&mut self.writes);
        let mut inner = self.store.lock();

        for (id, seen) in &reads {
            if inner.revision(id) != *seen {
                warn!(key = %id, "Transaction conflict, nothing applied");
                return Err(StorageError::Conflict(id.clone()));
            }
        }

        let write_count = writes.len();
        for write in writes {
            inner.clock += 1;
            let revision = inner.clock;
            match write {
                Write::Put(id, props) => {
                    inner.revisions.insert(id.clone(), revision);
                    inner.records.insert(id, props);
                }
                Write::Delete(id) => {
                    inner.revisions.insert(id.clone(), revision);
                    inner.records.remove(&id);
                }
            }
        }

        // this transaction is the only one still open
        if inner.open_transactions == 1 {
            inner.prune();
        }

        debug!(reads = reads.len(), writes = write_count, "Committed memory transaction");
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        let mut inner = self.store.lock();
        inner.open_transactions = inner.open_transactions.saturating_sub(1);
    }
}

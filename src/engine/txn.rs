//! Engine transactions
//!
//! A `Txn` is bound to the snapshot captured when it began. Writes are
//! buffered and applied as one batch on `commit`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;

use super::iterator::DbIterator;
use super::{EngineCore, Snapshot};

/// A snapshot-bound engine transaction
pub struct Txn {
    core: Arc<EngineCore>,
    snapshot: Snapshot,
    /// Buffered writes; a later write to the same key replaces the earlier one
    pending: BTreeMap<Vec<u8>, MemTableEntry>,
    read_only: bool,
}

impl Txn {
    pub(crate) fn new(core: Arc<EngineCore>, snapshot: Snapshot, read_only: bool) -> Self {
        Self {
            core,
            snapshot,
            pending: BTreeMap::new(),
            read_only,
        }
    }

    /// Get a value by physical key
    ///
    /// Sees this transaction's own buffered writes, then the snapshot.
    /// Returns `Err(KeyNotFound)` when the key is absent or deleted.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let entry = match self.pending.get(key) {
            Some(entry) => Some(entry.clone()),
            None => self.snapshot.get(key)?,
        };

        match entry {
            Some(MemTableEntry::Value(value)) => Ok(value),
            Some(MemTableEntry::Tombstone) | None => Err(KvError::KeyNotFound),
        }
    }

    /// Buffer a put
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.buffer(key, MemTableEntry::Value(value))
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.buffer(key, MemTableEntry::Tombstone)
    }

    fn buffer(&mut self, key: Vec<u8>, entry: MemTableEntry) -> Result<()> {
        if self.read_only {
            return Err(KvError::ReadOnlyTransaction);
        }
        self.pending.insert(key, entry);
        Ok(())
    }

    /// Apply every buffered write atomically
    ///
    /// A read-only transaction has nothing to apply and commits as a no-op.
    pub fn commit(mut self) -> Result<()> {
        if self.read_only || self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending).into_iter().collect();
        self.core.commit(batch)
    }

    /// Release the transaction without applying anything
    pub fn discard(self) {
        tracing::trace!(seq = self.snapshot.seq, "transaction discarded");
    }

    /// Iterator over physical keys (unpositioned until `seek`/`rewind`)
    pub fn new_iterator(&self) -> DbIterator<'_> {
        DbIterator::new(&self.pending, &self.snapshot)
    }

    /// Sequence number of the bound snapshot
    pub fn read_seq(&self) -> u64 {
        self.snapshot.seq
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of distinct keys buffered for commit
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        self.core.release_txn();
    }
}

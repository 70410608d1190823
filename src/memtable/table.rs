//! MemTable implementation
//!
//! Multi-version BTreeMap with a RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::MemTableEntry;

/// Per-key version chain, ordered by sequence number
type Versions = BTreeMap<u64, MemTableEntry>;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Versions>>,
    /// Approximate size in bytes (keys + all versions)
    size: AtomicUsize,
    /// Number of versions stored
    entry_count: AtomicUsize,
    /// Highest sequence number applied
    max_seq: AtomicU64,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
            max_seq: AtomicU64::new(0),
        }
    }

    /// Record a version of `key` at `seq`; returns the new approximate size
    ///
    /// Writing the same `(key, seq)` twice replaces the earlier version.
    pub fn apply(&self, seq: u64, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let mut data = self.data.write();
        let key_len = key.len();
        let entry_size = entry.size() + std::mem::size_of::<u64>();

        let versions = data.entry(key).or_default();
        let added = match versions.insert(seq, entry) {
            Some(old) => {
                self.size
                    .fetch_sub(old.size() + std::mem::size_of::<u64>(), Ordering::Relaxed);
                entry_size
            }
            None => {
                self.entry_count.fetch_add(1, Ordering::Relaxed);
                entry_size + key_len
            }
        };
        self.max_seq.fetch_max(seq, Ordering::Relaxed);

        self.size.fetch_add(added, Ordering::Relaxed) + added
    }

    /// Put a key-value pair at `seq`
    pub fn put(&self, seq: u64, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.apply(seq, key, MemTableEntry::Value(value))
    }

    /// Delete a key at `seq` (inserts tombstone)
    pub fn delete(&self, seq: u64, key: Vec<u8>) -> usize {
        self.apply(seq, key, MemTableEntry::Tombstone)
    }

    /// Newest version of `key` visible at `seq`
    ///
    /// Returns `None` when the memtable holds no visible version, in which
    /// case older storage must be consulted.
    pub fn get(&self, key: &[u8], seq: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        data.get(key)
            .and_then(|versions| Self::visible(versions, seq))
            .cloned()
    }

    /// First key past `bound` with a version visible at `seq`
    ///
    /// Tombstones are returned, not skipped, so callers can shadow older
    /// storage.
    pub fn seek(&self, bound: Bound<&[u8]>, seq: u64) -> Option<(Vec<u8>, MemTableEntry)> {
        let data = self.data.read();
        data.range::<[u8], _>((bound, Bound::Unbounded))
            .find_map(|(key, versions)| {
                Self::visible(versions, seq).map(|entry| (key.clone(), entry.clone()))
            })
    }

    /// Newest version of every key, in key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let data = self.data.read();
        let entries: Vec<_> = data
            .iter()
            .filter_map(|(key, versions)| {
                versions
                    .values()
                    .next_back()
                    .map(|entry| (key.clone(), entry.clone()))
            })
            .collect();

        MemTableIterator {
            inner: entries.into_iter(),
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get number of stored versions
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Get number of distinct keys
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Highest sequence number applied so far
    pub fn max_seq(&self) -> u64 {
        self.max_seq.load(Ordering::Relaxed)
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    fn visible(versions: &Versions, seq: u64) -> Option<&MemTableEntry> {
        versions.range(..=seq).next_back().map(|(_, entry)| entry)
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the newest version of each MemTable key
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

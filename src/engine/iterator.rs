//! Engine iterator
//!
//! Merges a transaction's buffered writes, the snapshot MemTable and every
//! SSTable into one ascending cursor over live keys.
//!
//! Sources are ranked: pending writes, then MemTable, then SSTables newest
//! → oldest. When several sources hold the same key the highest-ranked
//! one wins. Tombstones are skipped. Cursor movement only touches
//! in-memory structures; reading a value from an SSTable is deferred to
//! `DbItem::value` and may fail with an I/O error.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::sstable::{IndexEntry, SSTableReader};

use super::Snapshot;

enum Source<'t> {
    Pending(&'t BTreeMap<Vec<u8>, MemTableEntry>),
    Mem { memtable: &'t MemTable, seq: u64 },
    Table(&'t SSTableReader),
}

impl<'t> Source<'t> {
    /// First entry of this source past `bound`; `None` slot is a tombstone
    fn peek(&self, bound: Bound<&[u8]>) -> Option<(Vec<u8>, Option<Slot<'t>>)> {
        match self {
            Source::Pending(pending) => pending
                .range::<[u8], _>((bound, Bound::Unbounded))
                .next()
                .map(|(key, entry)| (key.clone(), Slot::from_entry(entry.clone()))),
            Source::Mem { memtable, seq } => memtable
                .seek(bound, *seq)
                .map(|(key, entry)| (key, Slot::from_entry(entry))),
            Source::Table(table) => {
                let table: &'t SSTableReader = *table;
                table.seek(bound).map(|(key, entry)| {
                    let slot = if entry.is_tombstone() {
                        None
                    } else {
                        Some(Slot::OnDisk { table, entry })
                    };
                    (key.to_vec(), slot)
                })
            }
        }
    }
}

enum Slot<'t> {
    Inline(Vec<u8>),
    OnDisk {
        table: &'t SSTableReader,
        entry: IndexEntry,
    },
}

impl<'t> Slot<'t> {
    fn from_entry(entry: MemTableEntry) -> Option<Self> {
        match entry {
            MemTableEntry::Value(value) => Some(Slot::Inline(value)),
            MemTableEntry::Tombstone => None,
        }
    }
}

/// The live entry under the cursor
pub struct DbItem<'t> {
    key: Vec<u8>,
    slot: Slot<'t>,
}

impl<'t> DbItem<'t> {
    /// Physical key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value bytes; reads from disk for SSTable entries
    pub fn value(&self) -> Result<Vec<u8>> {
        match &self.slot {
            Slot::Inline(value) => Ok(value.clone()),
            Slot::OnDisk { table, entry } => table.read_value(*entry),
        }
    }

    /// Value length without reading it
    pub fn value_size(&self) -> usize {
        match &self.slot {
            Slot::Inline(value) => value.len(),
            Slot::OnDisk { entry, .. } => entry.val_len as usize,
        }
    }
}

/// Ascending cursor over the live keys of one snapshot
pub struct DbIterator<'t> {
    sources: Vec<Source<'t>>,
    current: Option<DbItem<'t>>,
}

impl<'t> DbIterator<'t> {
    pub(crate) fn new(
        pending: &'t BTreeMap<Vec<u8>, MemTableEntry>,
        snapshot: &'t Snapshot,
    ) -> Self {
        let mut sources = Vec::with_capacity(2 + snapshot.tables.len());
        if !pending.is_empty() {
            sources.push(Source::Pending(pending));
        }
        sources.push(Source::Mem {
            memtable: &snapshot.memtable,
            seq: snapshot.seq,
        });
        sources.extend(
            snapshot
                .tables
                .iter()
                .map(|table| Source::Table(table.as_ref())),
        );

        Self {
            sources,
            current: None,
        }
    }

    /// Position at the first key >= `key`
    pub fn seek(&mut self, key: &[u8]) {
        self.position(Bound::Included(key));
    }

    /// Position at the first key overall
    pub fn rewind(&mut self) {
        self.position(Bound::Unbounded);
    }

    /// Whether the cursor refers to an entry
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Whether the cursor refers to an entry whose key starts with `prefix`
    pub fn valid_for_prefix(&self, prefix: &[u8]) -> bool {
        self.current
            .as_ref()
            .map_or(false, |item| item.key.starts_with(prefix))
    }

    /// Advance to the next live key; no-op once exhausted
    pub fn next(&mut self) {
        if let Some(current) = self.current.take() {
            self.position(Bound::Excluded(current.key.as_slice()));
        }
    }

    /// The entry under the cursor
    pub fn item(&self) -> Option<&DbItem<'t>> {
        self.current.as_ref()
    }

    /// Release the iterator
    pub fn close(self) {}

    fn position(&mut self, bound: Bound<&[u8]>) {
        let mut bound: Bound<Vec<u8>> = match bound {
            Bound::Included(key) => Bound::Included(key.to_vec()),
            Bound::Excluded(key) => Bound::Excluded(key.to_vec()),
            Bound::Unbounded => Bound::Unbounded,
        };

        loop {
            let mut best: Option<(Vec<u8>, Option<Slot<'t>>)> = None;

            for source in &self.sources {
                let Some((key, slot)) = source.peek(as_slice_bound(&bound)) else {
                    continue;
                };
                // strict comparison keeps the higher-ranked source on ties
                let better = match &best {
                    Some((best_key, _)) => key < *best_key,
                    None => true,
                };
                if better {
                    best = Some((key, slot));
                }
            }

            match best {
                None => {
                    self.current = None;
                    return;
                }
                Some((key, None)) => {
                    bound = Bound::Excluded(key);
                }
                Some((key, Some(slot))) => {
                    self.current = Some(DbItem { key, slot });
                    return;
                }
            }
        }
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

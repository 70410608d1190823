//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Keep every committed version so open snapshots stay stable
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and range scans
//!
//! ## Data Structure Choice
//! `BTreeMap<key, BTreeMap<seq, entry>>` behind a RwLock:
//! - Ordered keys (required for SSTable generation and cursors)
//! - A snapshot at sequence `s` sees the newest version with `seq <= s`

mod table;

pub use table::{MemTable, MemTableIterator};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Approximate heap footprint of this entry
    pub fn size(&self) -> usize {
        match self {
            MemTableEntry::Value(v) => v.len() + 1,
            MemTableEntry::Tombstone => 1,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemTableEntry::Tombstone)
    }
}

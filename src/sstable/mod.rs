//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "CFKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry ...                       │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][ValLen: u32][Key]          │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The index carries `ValLen`, so cursors can step over tombstones without
//! touching the data block. Values are read lazily by offset.

mod builder;
mod manager;
mod reader;

use std::path::PathBuf;
use std::sync::Arc;

pub use builder::{temp_path, SSTableBuilder};
pub use manager::{lookup, SSTableManager};
pub use reader::{IndexEntry, SSTableReader};

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Magic bytes identifying a cfkv SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"CFKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Immutable list of open tables, newest first
///
/// Snapshots hold one of these; flushes publish a new list instead of
/// mutating the old one.
pub type TableList = Arc<Vec<Arc<SSTableReader>>>;

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Metadata describing a freshly built SSTable
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

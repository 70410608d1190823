//! SSTable Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Publish immutable table lists for snapshots

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::{temp_path, SSTable, SSTableBuilder, SSTableReader, TableList};

/// Manages the on-disk table set
///
/// ## Concurrency:
/// - `sstables`: RwLock around an `Arc` list; readers clone the `Arc` and
///   drop the lock immediately
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct SSTableManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<TableList>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,
}

impl SSTableManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove tables left half-built by an interrupted flush
    /// 3. Discover existing SSTable files
    /// 4. Open readers for each (loads indexes into RAM)
    /// 5. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().is_some_and(|ext| ext == "tmp") {
                tracing::warn!(
                    path = %file_path.display(),
                    "removing unfinished SSTable"
                );
                fs::remove_file(&file_path)?;
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            let reader = SSTableReader::open(&sstable_path)?;
            sstables.push(Arc::new(reader));
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            tables = sstables.len(),
            next_id,
            "opened SSTable directory"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(Arc::new(sstables)),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Current table list (cheap `Arc` clone)
    pub fn tables(&self) -> TableList {
        Arc::clone(&self.sstables.read())
    }

    /// Get a key by searching all SSTables newest → oldest
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match lookup(&self.tables(), key)? {
            Some(MemTableEntry::Value(value)) => Ok(Some(value)),
            Some(MemTableEntry::Tombstone) | None => Ok(None),
        }
    }

    /// Write the newest version of every MemTable key to a new SSTable
    ///
    /// The new table goes to the front of a freshly published list; lists
    /// already handed out are left untouched.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(KvError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let built = Self::build(&path, memtable)
            .and_then(|metadata| Ok((metadata, SSTableReader::open(&path)?)));
        let (metadata, reader) = match built {
            Ok(built) => built,
            Err(e) => {
                let _ = fs::remove_file(temp_path(&path));
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };
        let reader = Arc::new(reader);

        let mut sstables = self.sstables.write();
        let mut next = Vec::with_capacity(sstables.len() + 1);
        next.push(reader);
        next.extend(sstables.iter().cloned());
        *sstables = Arc::new(next);

        tracing::info!(
            path = %metadata.path.display(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "flushed memtable to SSTable"
        );

        Ok(metadata)
    }

    fn build(path: &Path, memtable: &MemTable) -> Result<SSTable> {
        let mut builder = SSTableBuilder::new(path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        builder.finish()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}

/// Search a table list newest → oldest; the first table holding the key wins
pub fn lookup(tables: &[Arc<SSTableReader>], key: &[u8]) -> Result<Option<MemTableEntry>> {
    for reader in tables {
        if !reader.might_contain(key) {
            continue;
        }
        if let Some(entry) = reader.get(key)? {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

//! Engine Module
//!
//! The physical storage engine: an ordered byte-string store with
//! snapshot transactions.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and SSTables
//! - Hand out snapshot-bound transactions
//! - Apply committed batches atomically
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

mod iterator;
mod txn;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::sstable::{self, SSTableManager, TableList};
use crate::wal::{Operation, WalRecovery, WalWriter};

pub use iterator::{DbItem, DbIterator};
pub use txn::Txn;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Commits** and **flushes**: Serialized by `write_lock`
///   - Only ONE batch is applied at a time
///   - Must acquire: write_lock → WAL → memtable → state (publish)
///
/// - **Transactions**: capture `(seq, memtable, tables)` under a read lock
///   on `state` and never block writers afterwards
///
/// A committed batch gets one sequence number. The number is published
/// only after every entry is in the MemTable, so a snapshot sees either
/// the whole batch or none of it.
///
/// `Engine` is a cheap handle; clones share the same core.
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

pub(crate) struct EngineCore {
    config: Config,

    /// Directory for SSTables
    storage_dir: PathBuf,

    wal: Mutex<WalWriter>,

    sstables: SSTableManager,

    /// Active memtable and last published sequence number
    state: RwLock<EngineState>,

    /// Serializes commits and flushes
    write_lock: Mutex<()>,

    /// Transactions begun and not yet dropped
    open_txns: AtomicUsize,

    closed: AtomicBool,
}

struct EngineState {
    memtable: Arc<MemTable>,
    last_seq: u64,
}

/// A consistent point-in-time view of the engine
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub(crate) seq: u64,
    pub(crate) memtable: Arc<MemTable>,
    pub(crate) tables: TableList,
}

impl Snapshot {
    /// Newest entry for `key`: MemTable first, then SSTables newest → oldest
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        if let Some(entry) = self.memtable.get(key, self.seq) {
            return Ok(Some(entry));
        }
        sstable::lookup(&self.tables, key)
    }
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush, truncate
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.sstable_dir();
        let wal_path = config.wal_path();

        let sstables = SSTableManager::open(&storage_dir)?;
        let memtable = MemTable::new();
        let mut last_seq = 0;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    truncated = recovery.was_truncated,
                    "WAL recovery complete"
                );
            }

            // one sequence number per recovered batch, as at commit time
            for entry in entries {
                last_seq += 1;
                for operation in entry.operations {
                    match operation {
                        Operation::Put { key, value } => {
                            memtable.put(last_seq, key, value);
                        }
                        Operation::Delete { key } => {
                            memtable.delete(last_seq, key);
                        }
                    }
                }
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        // Recovered data must be durable in an SSTable before the WAL goes
        if !memtable.is_empty() {
            tracing::info!(
                keys = memtable.key_count(),
                "flushing recovered entries to SSTable"
            );
            sstables.flush(&memtable)?;
            wal.truncate()?;
        }

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = sstables.sstable_count(),
            "engine opened"
        );

        Ok(Self {
            core: Arc::new(EngineCore {
                config,
                storage_dir,
                wal: Mutex::new(wal),
                sstables,
                state: RwLock::new(EngineState {
                    memtable: Arc::new(MemTable::new()),
                    last_seq,
                }),
                write_lock: Mutex::new(()),
                open_txns: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Open `path` with otherwise default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::for_dir(path))
    }

    /// Begin a transaction bound to the current snapshot
    ///
    /// Read-only transactions reject `set`/`delete`. Either kind must be
    /// committed, discarded or dropped to release its snapshot.
    pub fn begin_transaction(&self, read_only: bool) -> Result<Txn> {
        self.core.ensure_open()?;
        let snapshot = self.core.snapshot();
        self.core.open_txns.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(seq = snapshot.seq, read_only, "transaction begun");

        Ok(Txn::new(Arc::clone(&self.core), snapshot, read_only))
    }

    /// Run `f` inside a read-write transaction and commit it
    ///
    /// If `f` fails, nothing it buffered is applied.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Txn) -> Result<()>,
    {
        let mut txn = self.begin_transaction(false)?;
        match f(&mut txn) {
            Ok(()) => txn.commit(),
            Err(e) => {
                txn.discard();
                Err(e)
            }
        }
    }

    /// Run `f` inside a read-only transaction
    pub fn view<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Txn) -> Result<T>,
    {
        let txn = self.begin_transaction(true)?;
        let result = f(&txn);
        txn.discard();
        result
    }

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.core.write_lock.lock();
        self.core.flush_internal()
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs the WAL. Later transactions fail
    /// with a lifecycle error.
    pub fn close(self) -> Result<()> {
        let _write_guard = self.core.write_lock.lock();
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Err(KvError::Lifecycle("engine already closed".to_string()));
        }

        let open = self.core.open_txns.load(Ordering::SeqCst);
        if open > 0 {
            tracing::warn!(open, "closing engine with transactions still open");
        }

        self.core.flush_internal()?;
        self.core.wal.lock().sync()?;

        tracing::info!(data_dir = %self.core.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.core.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.core.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.core.state.read().memtable.size()
    }

    /// Get the memtable version count
    pub fn memtable_entry_count(&self) -> usize {
        self.core.state.read().memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.core.sstables.sstable_count()
    }

    /// Last published sequence number
    pub fn last_seq(&self) -> u64 {
        self.core.state.read().last_seq
    }

    /// Transactions begun and not yet released
    pub fn open_transactions(&self) -> usize {
        self.core.open_txns.load(Ordering::SeqCst)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.core.config
    }
}

impl EngineCore {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KvError::Lifecycle("engine is closed".to_string()));
        }
        Ok(())
    }

    /// Capture a consistent view
    ///
    /// The table list is read while holding the state lock. A flush
    /// publishes its table before swapping the memtable under the write
    /// lock, so a snapshot never pairs a fresh memtable with a stale list.
    fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            seq: state.last_seq,
            memtable: Arc::clone(&state.memtable),
            tables: self.sstables.tables(),
        }
    }

    pub(crate) fn release_txn(&self) {
        self.open_txns.fetch_sub(1, Ordering::SeqCst);
    }

    /// Apply one batch atomically
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append the whole batch as one WAL entry (durability)
    /// 3. Insert every entry into the MemTable under a fresh sequence number
    /// 4. Publish the sequence number
    /// 5. Check if flush needed
    pub(crate) fn commit(&self, batch: Vec<(Vec<u8>, MemTableEntry)>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        let operations = batch
            .iter()
            .map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Operation::Put {
                    key: key.clone(),
                    value: value.clone(),
                },
                MemTableEntry::Tombstone => Operation::Delete { key: key.clone() },
            })
            .collect();

        let lsn = self.wal.lock().append(operations)?;

        let (memtable, seq) = {
            let state = self.state.read();
            (Arc::clone(&state.memtable), state.last_seq + 1)
        };

        let entries = batch.len();
        let mut size = memtable.size();
        for (key, entry) in batch {
            size = memtable.apply(seq, key, entry);
        }

        self.state.write().last_seq = seq;

        tracing::debug!(seq, lsn, entries, "batch committed");

        if size >= self.config.memtable_size_limit {
            // The batch is already durable and visible; a failed flush is
            // retried on the next commit.
            if let Err(e) = self.flush_internal() {
                tracing::error!("memtable flush failed after commit {}: {}", seq, e);
            }
        }

        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        let memtable = Arc::clone(&self.state.read().memtable);
        if memtable.is_empty() {
            return Ok(());
        }

        // Step 1: Publish the SSTable (open snapshots keep their old list)
        self.sstables.flush(&memtable)?;

        // Step 2: Swap in an empty memtable (open snapshots keep the old one)
        self.state.write().memtable = Arc::new(MemTable::new());

        // Step 3: Truncate WAL (entries are now durable in SSTable)
        self.wal.lock().truncate()?;

        Ok(())
    }
}

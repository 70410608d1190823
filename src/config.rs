//! Configuration for cfkv
//!
//! One `Config` drives both the storage engine and the TCP server. Build it
//! with `Config::builder()` and check it with `validate()`; the engine and
//! `cfkv-server` both refuse a config that fails validation.
//!
//! On-disk layout under `data_dir`:
//!
//! ```text
//! {data_dir}/
//!   ├── wal.log                  one record per committed batch
//!   └── sstables/
//!         ├── sstable_000001.sst
//!         └── sstable_000002.sst.tmp   (flush in progress)
//! ```

use std::path::PathBuf;

use crate::error::{KvError, Result};

const WAL_FILENAME: &str = "wal.log";
const SSTABLE_DIR: &str = "sstables";

#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------
    /// Root of the on-disk layout above
    pub data_dir: PathBuf,

    /// When WAL appends reach the disk
    pub wal_sync_strategy: WalSyncStrategy,

    /// MemTable bytes that trigger a flush to a new SSTable
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Server
    // -------------------------------------------------------------------------
    /// Address `cfkv-server` binds (port 0 picks a free port)
    pub listen_addr: String,

    /// Connections beyond this are sent an error and closed
    pub max_connections: usize,

    /// Threads draining the accepted-connection queue
    pub worker_threads: usize,

    /// Per-connection socket timeouts in milliseconds (0 disables)
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

/// When a WAL append is fsynced
///
/// Entries are always flushed to the OS before `append` returns; the
/// strategy only controls `sync_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// Every committed batch is on disk before the commit returns
    EveryWrite,

    /// fsync once `count` batches have accumulated; a crash may lose up to
    /// `count - 1` acknowledged batches
    EveryNEntries { count: usize },
}

impl WalSyncStrategy {
    /// Whether `unsynced` pending entries call for an fsync
    pub fn should_sync(self, unsynced: usize) -> bool {
        match self {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => unsynced >= count,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cfkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024,
            listen_addr: "127.0.0.1:20160".to_string(),
            max_connections: 1024,
            worker_threads: 8,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Defaults rooted at `data_dir`
    pub fn for_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::builder().data_dir(data_dir).build()
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILENAME)
    }

    pub fn sstable_dir(&self) -> PathBuf {
        self.data_dir.join(SSTABLE_DIR)
    }

    /// Reject settings the engine or server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(KvError::Config("data_dir must not be empty".to_string()));
        }
        if self.memtable_size_limit == 0 {
            return Err(KvError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(KvError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(KvError::Config("listen_addr must not be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(KvError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(KvError::Config(
                "worker_threads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// MemTable flush threshold in bytes
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

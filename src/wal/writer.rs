//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{KvError, Result};

use super::{Operation, WalEntry, WalReader};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Bytes of complete entries in the file
    len: u64,
    /// Set when a failed append could not be undone
    failed: bool,
}

impl WalWriter {
    /// Open or create a WAL file, continuing after the last valid LSN
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let current_lsn = if path.exists() {
            let mut last = 0;
            for entry in WalReader::open(path)?.entries() {
                match entry {
                    Ok(entry) => last = entry.lsn,
                    Err(_) => break,
                }
            }
            last
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_lsn,
            sync_strategy,
            unsynced: 0,
            len,
            failed: false,
        })
    }

    /// Append one batch as a single entry; returns its LSN
    ///
    /// On error the log is cut back to its previous length, so a batch
    /// reported as failed is never replayed. If that cut fails too, every
    /// later append is refused.
    pub fn append(&mut self, operations: Vec<Operation>) -> Result<u64> {
        if self.failed {
            return Err(KvError::Storage(format!(
                "WAL {} is unusable after a failed rollback",
                self.path.display()
            )));
        }

        let lsn = self.current_lsn + 1;
        let entry = WalEntry::new(lsn, operations);
        let bytes = entry.serialize()?;

        let start = self.len;
        if let Err(e) = self.write_entry(&bytes) {
            if let Err(rollback) = self.rollback(start) {
                tracing::error!(
                    path = %self.path.display(),
                    "WAL rollback failed, refusing further writes: {}",
                    rollback
                );
                self.failed = true;
            }
            return Err(e);
        }

        self.len = start + bytes.len() as u64;
        self.current_lsn = lsn;
        Ok(lsn)
    }

    fn write_entry(&mut self, bytes: &[u8]) -> Result<()> {
        let mut writer = BufWriter::new(&self.file);
        let written = writer.write_all(bytes).and_then(|()| writer.flush());
        // into_parts hands back whatever never reached the file, unwritten
        let (_, _unwritten) = writer.into_parts();
        written?;
        self.unsynced += 1;

        if self.sync_strategy.should_sync(self.unsynced) {
            self.sync()?;
        }
        Ok(())
    }

    /// Cut the file back to `len`, dropping a partly written entry
    fn rollback(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (their contents are durable elsewhere)
    ///
    /// LSNs keep increasing across truncation.
    pub fn truncate(&mut self) -> Result<()> {
        let file = &self.file;
        file.set_len(0)?;
        file.sync_all()?;
        self.unsynced = 0;
        self.len = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current on-disk size of the log
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// True once a failed append could not be rolled back
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::WalRecovery;
    use tempfile::TempDir;

    fn put(key: &[u8]) -> Vec<Operation> {
        vec![Operation::Put {
            key: key.to_vec(),
            value: b"v".to_vec(),
        }]
    }

    fn recovered_keys(path: &Path) -> Vec<Vec<u8>> {
        let (entries, result) = WalRecovery::recover(path).unwrap();
        assert_eq!(result.entries_corrupted, 0);
        entries
            .iter()
            .flat_map(|e| e.operations.iter())
            .map(|op| match op {
                Operation::Put { key, .. } | Operation::Delete { key } => key.clone(),
            })
            .collect()
    }

    #[test]
    fn rollback_drops_partly_written_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wal.log");
        let mut wal = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

        wal.append(put(b"kept")).unwrap();
        let good_len = wal.len().unwrap();

        // the head of an entry whose write then failed
        let doomed = WalEntry::new(2, put(b"failed")).serialize().unwrap();
        (&wal.file).write_all(&doomed[..doomed.len() / 2]).unwrap();
        assert!(wal.len().unwrap() > good_len);

        wal.rollback(good_len).unwrap();
        assert_eq!(wal.len().unwrap(), good_len);
        assert_eq!(wal.current_lsn(), 1);
        assert!(!wal.is_failed());

        assert_eq!(wal.append(put(b"next")).unwrap(), 2);
        drop(wal);

        assert_eq!(recovered_keys(&path), vec![b"kept".to_vec(), b"next".to_vec()]);
    }

    #[test]
    fn appends_continue_after_truncate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wal.log");
        let mut wal = WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 2 }).unwrap();

        wal.append(put(b"a")).unwrap();
        wal.truncate().unwrap();
        assert_eq!(wal.append(put(b"b")).unwrap(), 2);
        drop(wal);

        assert_eq!(recovered_keys(&path), vec![b"b".to_vec()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_rollback_refuses_later_appends() {
        // writes to /dev/full fail and it cannot be truncated
        let file = OpenOptions::new().write(true).open("/dev/full").unwrap();
        let mut wal = WalWriter {
            path: PathBuf::from("/dev/full"),
            file,
            current_lsn: 0,
            sync_strategy: WalSyncStrategy::EveryWrite,
            unsynced: 0,
            len: 0,
            failed: false,
        };

        assert!(wal.append(put(b"k")).is_err());
        assert!(wal.is_failed());
        assert_eq!(wal.current_lsn(), 0);

        let err = wal.append(put(b"k")).unwrap_err();
        assert!(matches!(err, KvError::Storage(ref msg) if msg.contains("unusable")));
    }
}

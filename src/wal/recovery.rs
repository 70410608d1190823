//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{KvError, Result};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (recovery stops at the first one)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read entries until the first torn or corrupt one
    /// 2. Truncate the file back to the last good entry
    /// 3. Return all valid entries in order
    ///
    /// Entries after a corrupt one are dropped: replaying a later batch
    /// without an earlier one would reorder history.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, good_len, file_len) = Self::scan(path)?;

        if good_len < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(good_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                path = %path.display(),
                dropped_bytes = file_len - good_len,
                "truncated torn WAL tail"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(KvError::WalCorruption(msg)) | Err(KvError::Serialization(msg)) => {
                    tracing::warn!(path = %path.display(), "WAL corruption: {}", msg);
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, reader.position(), reader.file_len()))
    }
}

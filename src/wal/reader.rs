//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{KvError, Result};

use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file sequentially
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last entry read successfully
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, checksummed entry
    /// - `Ok(None)`: clean end of file
    /// - `Err(WalCorruption)`: torn tail or checksum failure
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Err(KvError::WalCorruption(format!(
                "partial header at offset {} ({} bytes)",
                self.position, remaining
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let (lsn, crc, len) = WalEntry::decode_header(&header);

        if remaining - (HEADER_SIZE as u64) < len as u64 {
            return Err(KvError::WalCorruption(format!(
                "partial entry at offset {}: LSN {} wants {} bytes",
                self.position, lsn, len
            )));
        }

        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data)?;

        let entry = WalEntry::from_parts(lsn, crc, &data)?;
        self.position += (HEADER_SIZE + data.len()) as u64;

        Ok(Some(entry))
    }

    /// Offset just past the last good entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total file length at open time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; yields the first error and then stops
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

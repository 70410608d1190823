//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;

use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Location of one entry in the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// File offset of the entry header
    pub offset: u64,
    /// Value length, or `TOMBSTONE_MARKER`
    pub val_len: u32,
}

impl IndexEntry {
    pub fn is_tombstone(&self) -> bool {
        self.val_len == TOMBSTONE_MARKER
    }
}

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind a Mutex so many snapshots can share one
/// reader through an `Arc`.
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → entry location
    index: BTreeMap<Vec<u8>, IndexEntry>,
    entry_count: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and data checksum, then loads the entire
    /// index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(KvError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(KvError::Storage(format!(
                "Invalid SSTable magic: expected CFKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(KvError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let data_crc = read_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(KvError::Storage(format!(
                "SSTable {} has index offset {} outside file of {} bytes",
                path.display(),
                index_offset,
                file_size
            )));
        }

        // Validate data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(KvError::Storage(format!(
                "SSTable {} data CRC mismatch: expected {:08x}, got {:08x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        let index = parse_index(&index_data)?;
        if index.len() as u64 != entry_count {
            return Err(KvError::Storage(format!(
                "SSTable {} index holds {} entries, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
        })
    }

    /// Look up a key in O(log n) via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Value))`: key found with value
    /// - `Ok(Some(Tombstone))`: key deleted in this table
    /// - `Ok(None)`: key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let entry = match self.index.get(key) {
            Some(&entry) => entry,
            None => return Ok(None),
        };

        if entry.is_tombstone() {
            return Ok(Some(MemTableEntry::Tombstone));
        }

        self.read_value(entry).map(|v| Some(MemTableEntry::Value(v)))
    }

    /// First indexed key past `bound` (no disk access)
    pub fn seek(&self, bound: Bound<&[u8]>) -> Option<(&[u8], IndexEntry)> {
        self.index
            .range::<[u8], _>((bound, Bound::Unbounded))
            .next()
            .map(|(key, entry)| (key.as_slice(), *entry))
    }

    /// Read the value bytes of a live entry
    pub fn read_value(&self, entry: IndexEntry) -> Result<Vec<u8>> {
        if entry.is_tombstone() {
            return Err(KvError::Storage(format!(
                "entry at offset {} in {} is a tombstone",
                entry.offset,
                self.path.display()
            )));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(entry.offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;

        let key_len = read_u32(&header[0..4]);
        let val_len = read_u32(&header[4..8]);
        if val_len != entry.val_len {
            return Err(KvError::Storage(format!(
                "entry at offset {} in {}: index says {} value bytes, data says {}",
                entry.offset,
                self.path.display(),
                entry.val_len,
                val_len
            )));
        }

        file.seek(SeekFrom::Current(key_len as i64))?;

        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;

        Ok(value)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }
}

/// Parse index entries: [key_len(4)][offset(8)][val_len(4)][key]
fn parse_index(data: &[u8]) -> Result<BTreeMap<Vec<u8>, IndexEntry>> {
    let mut index = BTreeMap::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + 16 > data.len() {
            return Err(KvError::Storage(format!(
                "truncated SSTable index entry at byte {}",
                pos
            )));
        }
        let key_len = read_u32(&data[pos..pos + 4]) as usize;
        let offset = read_u64(&data[pos + 4..pos + 12]);
        let val_len = read_u32(&data[pos + 12..pos + 16]);
        pos += 16;

        if pos + key_len > data.len() {
            return Err(KvError::Storage(format!(
                "truncated SSTable index key at byte {}",
                pos
            )));
        }
        let key = data[pos..pos + key_len].to_vec();
        pos += key_len;

        index.insert(key, IndexEntry { offset, val_len });
    }

    Ok(index)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

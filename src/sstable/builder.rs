//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    path: PathBuf,
    /// Where the table is written until `finish()` renames it into place
    temp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: (key, entry offset, value length or tombstone marker)
    index: Vec<(Vec<u8>, u64, u32)>,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()`/`add_tombstone()` in sorted order,
    /// then `finish()` to write index and footer.
    ///
    /// Nothing appears at `path` until `finish()` succeeds; the table is
    /// built in `temp_path(path)` and renamed.
    pub fn new(path: &Path) -> Result<Self> {
        let temp_path = temp_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        let mut writer = BufWriter::new(file);

        // entry count is patched in finish()
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            min_key: None,
            max_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (must be called in sorted key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone (must be called in sorted key order)
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some(last) = &self.max_key {
            if key <= last.as_slice() {
                return Err(KvError::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }
        if let Some(v) = value {
            if v.len() >= TOMBSTONE_MARKER as usize {
                return Err(KvError::Storage(format!(
                    "value of {} bytes is too large for an SSTable entry",
                    v.len()
                )));
            }
        }

        let key_len = key.len() as u32;
        let val_len = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };

        self.index.push((key.to_vec(), self.current_offset, val_len));

        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.max_key = Some(key.to_vec());

        // [key_len(4)][val_len(4)][key][value]
        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        let mut entry_size: u64 = 8 + key.len() as u64;

        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
            entry_size += v.len() as u64;
        }

        self.current_offset += entry_size;
        self.entry_count += 1;

        Ok(())
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Finish building: write index block, footer, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        // [key_len(4)][offset(8)][val_len(4)][key]
        for (key, offset, val_len) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(&val_len.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();

        // index_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            KvError::Storage(format!("Failed to flush SSTable: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
            file_size,
        })
    }
}

/// In-progress name for a table: `sstable_000001.sst` → `sstable_000001.sst.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Make a rename inside the directory durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

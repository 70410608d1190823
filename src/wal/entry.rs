//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Header size: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL: one committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operations of the batch, in commit order
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged (keys are physical keys)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

/// Serialized body of an entry (everything after the header)
#[derive(Serialize, Deserialize)]
struct EntryBody {
    operations: Vec<Operation>,
    timestamp: u64,
}

impl WalEntry {
    /// Create a new entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Serialize to `[LSN][CRC][Len][Data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = EntryBody {
            operations: self.operations.clone(),
            timestamp: self.timestamp,
        };
        let data = bincode::serialize(&body)
            .map_err(|e| KvError::Serialization(e.to_string()))?;

        let crc = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);

        Ok(bytes)
    }

    /// Deserialize one complete entry, validating length and checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(KvError::WalCorruption(format!(
                "entry too short: {} bytes (header is {})",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = Self::decode_header(&bytes[..HEADER_SIZE]);

        let data = &bytes[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(KvError::WalCorruption(format!(
                "entry length mismatch: header says {}, got {}",
                len,
                data.len()
            )));
        }

        Self::from_parts(lsn, crc, data)
    }

    /// Split a header into (lsn, crc, payload length)
    pub(crate) fn decode_header(header: &[u8]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        )
    }

    /// Rebuild an entry from a decoded header and its payload
    pub(crate) fn from_parts(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(KvError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let body: EntryBody = bincode::deserialize(data)
            .map_err(|e| KvError::Serialization(e.to_string()))?;

        Ok(Self {
            lsn,
            operations: body.operations,
            timestamp: body.timestamp,
        })
    }
}

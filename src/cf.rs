//! Column Family Key Codec
//!
//! Multiplexes several logical keyspaces onto one physical engine.
//!
//! ## Encoding
//! ```text
//! ┌──────────────────┬─────┬──────────────────────┐
//! │ CF name (ASCII)  │ '_' │ logical key (bytes)  │
//! └──────────────────┴─────┴──────────────────────┘
//! ```
//!
//! No `name_` prefix is a prefix of another, so the mapping is injective.
//! Every key in one column family shares the same prefix, so byte order of
//! physical keys matches byte order of logical keys within that family.

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};

/// Separator between the column family name and the logical key
const CF_SEPARATOR: u8 = b'_';

/// The fixed set of column families known system-wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnFamily {
    Default,
    Lock,
    Write,
}

impl ColumnFamily {
    /// Every column family, in name order
    pub const ALL: [ColumnFamily; 3] = [
        ColumnFamily::Default,
        ColumnFamily::Lock,
        ColumnFamily::Write,
    ];

    /// The wire/storage name of this column family
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Default => "default",
            ColumnFamily::Lock => "lock",
            ColumnFamily::Write => "write",
        }
    }

    /// Physical key prefix shared by all keys in this column family
    pub fn prefix(&self) -> Vec<u8> {
        let name = self.name().as_bytes();
        let mut prefix = Vec::with_capacity(name.len() + 1);
        prefix.extend_from_slice(name);
        prefix.push(CF_SEPARATOR);
        prefix
    }
}

impl fmt::Display for ColumnFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnFamily {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(ColumnFamily::Default),
            "lock" => Ok(ColumnFamily::Lock),
            "write" => Ok(ColumnFamily::Write),
            other => Err(KvError::UnknownColumnFamily(other.to_string())),
        }
    }
}

impl TryFrom<&str> for ColumnFamily {
    type Error = KvError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

/// Encode `(cf, key)` into a physical key
pub fn key_with_cf(cf: ColumnFamily, key: &[u8]) -> Vec<u8> {
    let name = cf.name().as_bytes();
    let mut physical = Vec::with_capacity(name.len() + 1 + key.len());
    physical.extend_from_slice(name);
    physical.push(CF_SEPARATOR);
    physical.extend_from_slice(key);
    physical
}

/// Recover the logical key from a physical key known to belong to `cf`
pub fn strip_cf(cf: ColumnFamily, physical: &[u8]) -> Result<&[u8]> {
    let name = cf.name().as_bytes();
    match physical.strip_prefix(name) {
        Some([CF_SEPARATOR, rest @ ..]) => Ok(rest),
        _ => Err(KvError::Storage(format!(
            "physical key {:?} does not belong to column family {}",
            String::from_utf8_lossy(physical),
            cf
        ))),
    }
}

/// Split a physical key into its column family and logical key
pub fn split_cf(physical: &[u8]) -> Result<(ColumnFamily, &[u8])> {
    for cf in ColumnFamily::ALL {
        if let Ok(key) = strip_cf(cf, physical) {
            return Ok((cf, key));
        }
    }
    Err(KvError::Storage(format!(
        "physical key {:?} carries no known column family prefix",
        String::from_utf8_lossy(physical)
    )))
}

//! Write intents
//!
//! A batch is an ordered `Vec<Modify>`; a later entry on the same key
//! supersedes an earlier one.

use crate::cf::{key_with_cf, ColumnFamily};

/// A single write intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modify {
    Put {
        cf: ColumnFamily,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: ColumnFamily,
        key: Vec<u8>,
    },
}

impl Modify {
    pub fn put(cf: ColumnFamily, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Modify::Put {
            cf,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(cf: ColumnFamily, key: impl Into<Vec<u8>>) -> Self {
        Modify::Delete { cf, key: key.into() }
    }

    pub fn cf(&self) -> ColumnFamily {
        match self {
            Modify::Put { cf, .. } | Modify::Delete { cf, .. } => *cf,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Modify::Put { key, .. } | Modify::Delete { key, .. } => key,
        }
    }

    /// Value of a put; `None` for a delete
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Modify::Put { value, .. } => Some(value),
            Modify::Delete { .. } => None,
        }
    }

    /// Encoded engine key
    pub fn physical_key(&self) -> Vec<u8> {
        key_with_cf(self.cf(), self.key())
    }
}

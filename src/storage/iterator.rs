//! Column family iterator
//!
//! Wraps an engine cursor and confines it to one column family's prefix.
//! Keys come out decoded.

use crate::cf::{key_with_cf, ColumnFamily};
use crate::engine::{DbItem, DbIterator};
use crate::error::Result;

/// Ascending cursor over one column family
///
/// Borrows its reader, so it cannot outlive the snapshot it reads.
pub struct CfIterator<'r> {
    cf: ColumnFamily,
    prefix: Vec<u8>,
    inner: DbIterator<'r>,
}

impl<'r> CfIterator<'r> {
    pub(crate) fn new(cf: ColumnFamily, mut inner: DbIterator<'r>) -> Self {
        let prefix = cf.prefix();
        inner.seek(&prefix);
        Self { cf, prefix, inner }
    }

    /// Position at the first key >= `key` in this column family
    pub fn seek(&mut self, key: &[u8]) {
        self.inner.seek(&key_with_cf(self.cf, key));
    }

    /// Position at the first key of this column family
    pub fn rewind(&mut self) {
        self.inner.seek(&self.prefix);
    }

    /// Whether the cursor refers to an entry of this column family
    pub fn valid(&self) -> bool {
        self.inner.valid_for_prefix(&self.prefix)
    }

    pub fn next(&mut self) {
        self.inner.next();
    }

    /// The entry under the cursor, if valid
    pub fn item(&self) -> Option<CfItem<'_, 'r>> {
        if !self.valid() {
            return None;
        }
        self.inner.item().map(|item| CfItem {
            prefix_len: self.prefix.len(),
            item,
        })
    }

    pub fn cf(&self) -> ColumnFamily {
        self.cf
    }

    /// Release the iterator (its reader stays open)
    pub fn close(self) {
        self.inner.close();
    }
}

/// A decoded entry of a column family
pub struct CfItem<'i, 'r> {
    prefix_len: usize,
    item: &'i DbItem<'r>,
}

impl<'i, 'r> CfItem<'i, 'r> {
    /// Logical key (column family prefix removed)
    pub fn key(&self) -> &[u8] {
        &self.item.key()[self.prefix_len..]
    }

    /// Value bytes; may read from disk and fail
    pub fn value(&self) -> Result<Vec<u8>> {
        self.item.value()
    }

    pub fn value_size(&self) -> usize {
        self.item.value_size()
    }
}

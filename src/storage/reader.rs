//! Standalone snapshot reader

use crate::cf::{key_with_cf, ColumnFamily};
use crate::engine::Txn;
use crate::error::{KvError, Result};

use super::{CfIterator, StorageReader};

/// Reader owning one read-only engine transaction
pub struct StandaloneReader {
    txn: Txn,
}

impl StandaloneReader {
    pub(crate) fn new(txn: Txn) -> Self {
        Self { txn }
    }

    /// Sequence number of the bound snapshot
    pub fn read_seq(&self) -> u64 {
        self.txn.read_seq()
    }
}

impl StorageReader for StandaloneReader {
    fn get_cf(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.txn.get(&key_with_cf(cf, key)) {
            Ok(value) => Ok(Some(value)),
            Err(KvError::KeyNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn iter_cf(&self, cf: ColumnFamily) -> CfIterator<'_> {
        CfIterator::new(cf, self.txn.new_iterator())
    }

    /// Discards the transaction; a read path never commits
    fn close(self) {
        self.txn.discard();
    }
}

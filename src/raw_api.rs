//! Raw API
//!
//! Single-key get/put/delete and range scan over one column family, built
//! on any `Storage`. Each call opens its own reader or writes a one-entry
//! batch.

use std::sync::Arc;

use crate::cf::ColumnFamily;
use crate::error::{KvError, Result};
use crate::protocol::{encoded_pair_len, KvPair, KV_PAIRS_HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::storage::{Context, Modify, Storage, StorageReader};

#[derive(Debug, Clone, Default)]
pub struct RawGetRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGetResponse {
    pub value: Vec<u8>,
    pub not_found: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawPutRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct RawDeleteRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct RawScanRequest {
    pub context: Context,
    pub cf: String,
    pub start_key: Vec<u8>,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawScanResponse {
    pub kvs: Vec<KvPair>,
}

/// Raw API handlers over a shared storage
pub struct RawApi<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for RawApi<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> RawApi<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Point lookup; an absent key sets `not_found` and leaves `value` empty
    pub fn raw_get(&self, req: RawGetRequest) -> Result<RawGetResponse> {
        let cf: ColumnFamily = req.cf.parse()?;
        let reader = self.storage.reader(&req.context)?;
        let value = reader.get_cf(cf, &req.key);
        reader.close();

        Ok(match value? {
            Some(value) => RawGetResponse {
                value,
                not_found: false,
            },
            None => RawGetResponse {
                value: Vec::new(),
                not_found: true,
            },
        })
    }

    pub fn raw_put(&self, req: RawPutRequest) -> Result<()> {
        let cf: ColumnFamily = req.cf.parse()?;
        self.storage
            .write(&req.context, vec![Modify::put(cf, req.key, req.value)])
    }

    /// Deleting an absent key succeeds
    pub fn raw_delete(&self, req: RawDeleteRequest) -> Result<()> {
        let cf: ColumnFamily = req.cf.parse()?;
        self.storage
            .write(&req.context, vec![Modify::delete(cf, req.key)])
    }

    /// Up to `limit` pairs with key >= `start_key`, ascending
    ///
    /// Stops early once another pair would push the encoded result past
    /// `MAX_PAYLOAD_SIZE`; callers continue from the last returned key. A
    /// first pair that alone is too large fails with `Protocol`.
    pub fn raw_scan(&self, req: RawScanRequest) -> Result<RawScanResponse> {
        let cf: ColumnFamily = req.cf.parse()?;
        let reader = self.storage.reader(&req.context)?;
        let kvs = scan(&reader, cf, &req.start_key, req.limit);
        reader.close();

        Ok(RawScanResponse { kvs: kvs? })
    }
}

fn scan<R: StorageReader>(
    reader: &R,
    cf: ColumnFamily,
    start_key: &[u8],
    limit: u32,
) -> Result<Vec<KvPair>> {
    let mut kvs = Vec::with_capacity(limit.min(1024) as usize);
    let mut encoded = KV_PAIRS_HEADER_SIZE;
    let mut iter = reader.iter_cf(cf);
    iter.seek(start_key);

    while iter.valid() && kvs.len() < limit as usize {
        if let Some(item) = iter.item() {
            let pair_len = encoded_pair_len(item.key().len(), item.value_size());
            if encoded + pair_len > MAX_PAYLOAD_SIZE as usize {
                if kvs.is_empty() {
                    return Err(KvError::Protocol(format!(
                        "scan pair of {} bytes exceeds the {} byte response limit",
                        pair_len, MAX_PAYLOAD_SIZE
                    )));
                }
                tracing::debug!(
                    pairs = kvs.len(),
                    bytes = encoded,
                    "scan stopped at response size limit"
                );
                break;
            }
            encoded += pair_len;
            kvs.push(KvPair {
                key: item.key().to_vec(),
                value: item.value()?,
            });
        }
        iter.next();
    }

    iter.close();
    Ok(kvs)
}

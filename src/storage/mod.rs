//! Storage Module
//!
//! The façade request handlers use: engine lifecycle, snapshot readers
//! and atomic batch writes over column families.
//!
//! ```text
//! handler ──reader()──▶ StandaloneReader ──get_cf / iter_cf──┐
//!    │                                                       ▼
//!    └────write(batch)──▶ StandaloneStorage ──key_with_cf──▶ Engine
//! ```
//!
//! ## Lifecycle
//! `Uninitialized → Running` on `start`, `Running → Stopped` on `stop`.
//! Anything else is a `KvError::Lifecycle`.

mod iterator;
mod modify;
mod reader;
mod standalone;

use crate::cf::ColumnFamily;
use crate::error::Result;

pub use iterator::{CfItem, CfIterator};
pub use modify::Modify;
pub use reader::StandaloneReader;
pub use standalone::StandaloneStorage;

/// Per-request metadata
///
/// Reserved for routing and consistency hints; the standalone storage
/// ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub region_id: u64,
    pub peer: Option<String>,
}

/// Storage backend used by request handlers
///
/// Every method may be called concurrently from many threads.
pub trait Storage: Send + Sync {
    type Reader: StorageReader;

    /// Open the underlying engine
    fn start(&self) -> Result<()>;

    /// Close the underlying engine; open readers keep their snapshot
    fn stop(&self) -> Result<()>;

    /// Create a reader bound to the current snapshot
    fn reader(&self, ctx: &Context) -> Result<Self::Reader>;

    /// Apply `batch` atomically, in order
    fn write(&self, ctx: &Context, batch: Vec<Modify>) -> Result<()>;
}

/// A snapshot-bound read handle
///
/// Dropping a reader releases its snapshot; `close` does the same
/// explicitly.
pub trait StorageReader: Send {
    /// Point lookup; `Ok(None)` when the key is absent
    fn get_cf(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Ascending cursor over `cf`, positioned at its first key
    fn iter_cf(&self, cf: ColumnFamily) -> CfIterator<'_>;

    /// Release the snapshot without touching committed data
    fn close(self);
}

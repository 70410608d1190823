//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per committed batch before it becomes visible
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! `Data` is the bincode encoding of the batch. A batch is one entry, so a
//! torn write loses the whole batch and never a part of it.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE};
pub use writer::WalWriter;
pub use reader::{WalReader, WalIterator};
pub use recovery::{WalRecovery, RecoveryResult};

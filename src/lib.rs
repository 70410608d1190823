//! # cfkv
//!
//! A single-node key-value store with:
//! - Column families (`default`, `lock`, `write`) over one keyspace
//! - Atomic write batches backed by a write-ahead log
//! - Snapshot readers with ordered per-column-family iteration
//! - A TCP Raw API (get / put / delete / scan)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              TCP Server  →  Raw API handlers                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                StandaloneStorage                             │
//! │     start / stop / reader(ctx) / write(ctx, batch)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  cf_key encoding
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Engine                                   │
//! │        (transactions, snapshots, merged iterator)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┼────────────────┐
//!          ▼            ▼                ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │     WAL     │ │  MemTable   │ │  SSTables   │
//!   │  (Append)   │ │   (MVCC)    │ │ (immutable) │
//!   └─────────────┘ └─────────────┘ └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod cf;

pub mod wal;
pub mod memtable;
pub mod sstable;
pub mod engine;
pub mod storage;

pub mod protocol;
pub mod raw_api;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use cf::ColumnFamily;
pub use engine::Engine;
pub use storage::{Context, Modify, StandaloneStorage, Storage, StorageReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of cfkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

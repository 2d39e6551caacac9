//! Silt - Embedded Log-Structured Merge-Tree Key-Value Store
//!
//! A single-threaded, synchronous LSM engine for byte-string keys and
//! values. Writes land in an in-memory skip list, spill to immutable sorted
//! files once the buffer fills, and are merged down a level hierarchy to
//! keep point reads cheap.
//!
//! # Architecture
//!
//! - **MemTable**: in-memory skip list absorbing writes in sorted order
//! - **SSTable**: immutable sorted file with an in-memory key -> offset index
//! - **LsmTree**: controller routing put/get, flushing the MemTable to
//!   level 0 and cascading merges down the levels
//!
//! The engine is development-grade by design: no write-ahead log, no
//! crash recovery, no compression, no concurrent access.

pub mod lsm;
pub mod memtable;
pub mod sstable;

mod error;
mod types;

pub use error::{Result, SiltError};
pub use lsm::{LsmTree, TreeConfig, TreeStats};
pub use memtable::MemTable;
pub use sstable::SSTable;
pub use types::{Entry, Timestamp};

/// Silt version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Maximum MemTable size before flush, in entries
    pub const MAX_MEMTABLE_SIZE: usize = 1_048_576;

    /// Number of levels in the tree
    pub const MAX_LEVEL: usize = 7;

    /// Size ratio between adjacent levels
    pub const LEVEL_SIZE_MULTIPLIER: usize = 10;

    /// Level-0 entry count that forces a level-0 -> level-1 merge
    pub const L0_COMPACTION_TRIGGER: usize = 4096;
}

//! # HashKV
//!
//! A log-structured key-value store with a hash index (Bitcask-style):
//! - Append-only segment files with CRC32-checked records
//! - In-memory index from key to value location, rebuilt on open
//! - Size-based rotation of the active segment
//! - Hint files for fast reload of compacted segments
//! - Background compaction that drops overwritten and deleted values
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │        get / put / delete / close / do_compaction           │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!         ┌─────────────┐                 ┌─────────────┐
//!         │    Index    │                 │  Segments   │
//!         │  (RwLock)   │                 │ active + N  │
//!         └─────────────┘                 │   sealed    │
//!                                         └──────┬──────┘
//!                                                │
//!                                    ┌───────────┴───────────┐
//!                                    ▼                       ▼
//!                             ┌─────────────┐         ┌─────────────┐
//!                             │ Record Codec│         │  Hint File  │
//!                             └─────────────┘         └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod segment;
pub mod hint;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HashKvError, Result};
pub use config::{Config, SyncStrategy};
pub use store::{CompactionStats, Store, StoreState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Store Module
//!
//! The orchestrator callers talk to.
//!
//! ## Responsibilities
//! - Rebuild the index from segments on open (hint files first, scans otherwise)
//! - Route writes to the active segment and rotate it by size
//! - Resolve reads through the index to the owning segment
//! - Compact sealed segments in the background
//!
//! ## Data Flow
//! ```text
//!   put/delete ──► ActiveSegment (append) ──► Index update
//!   get ─────────► Index lookup ──► owning segment ──► byte-range read
//!   compaction ──► merge sealed pair ──► hint file ──► index repair ──► unlink inputs
//! ```

mod compaction;
mod index;
mod scheduler;
#[allow(clippy::module_inception)]
mod store;

pub use compaction::CompactionStats;
pub use index::Index;
pub use store::{Store, StoreState};

//! Error types for HashKV
//!
//! Provides a unified error type for all operations.
//!
//! A missing key is not an error: `Store::get` returns `Ok(None)`. Checksum
//! failures found while scanning a segment are not errors either; they end the
//! scan and are reported through `ScanSummary`.

use thiserror::Error;

/// Result type alias using HashKvError
pub type Result<T> = std::result::Result<T, HashKvError>;

/// Unified error type for HashKV operations
#[derive(Debug, Error)]
pub enum HashKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Data Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid segment file name: {0:?}")]
    InvalidSegmentName(String),

    #[error("Record too large: {len} bytes does not fit a 4-byte length field")]
    RecordTooLarge { len: u64 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Segment {0} is closed")]
    SegmentClosed(String),

    #[error("Store is closed")]
    StoreClosed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

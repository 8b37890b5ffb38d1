//! Record Module
//!
//! On-disk log records and the in-memory pointers that locate their values.
//!
//! ## Record Format (big-endian)
//! ```text
//! ┌───────────────┬──────────┬─────────────┬─────────────┬───────┬─────────┐
//! │ CRC32 (8)     │ Meta (1) │ KeyLen (4)  │ ValLen (4)  │  Key  │  Value  │
//! └───────────────┴──────────┴─────────────┴─────────────┴───────┴─────────┘
//!   checksum covers every byte from Meta to the end of Value
//!   Meta bit 0 = tombstone (ValLen = 0, no value bytes)
//! ```

mod codec;

use crate::segment::SegmentName;

pub use codec::{decode, decode_body, encode_put, encode_tombstone, DecodeError, DecodedRecord, RecordHeader};

// =============================================================================
// Format Constants
// =============================================================================

/// Width of the stored checksum (a CRC32 widened to 8 bytes)
pub const CHECKSUM_SIZE: usize = 8;

/// Fixed header preceding the key: checksum (8) + meta (1) + key len (4) + value len (4)
pub const HEADER_SIZE: usize = 17;

/// Meta bit marking a tombstone record
pub const META_TOMBSTONE: u8 = 0x01;

/// Largest key or value length the signed 4-byte length fields can hold
pub const MAX_FIELD_LEN: usize = i32::MAX as usize;

// =============================================================================
// Record Kind
// =============================================================================

/// What a log record does to its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Sets the key to the record's value
    Put,

    /// Deletes the key
    Tombstone,
}

impl RecordKind {
    /// Meta byte written for this kind
    pub fn meta(self) -> u8 {
        match self {
            RecordKind::Put => 0,
            RecordKind::Tombstone => META_TOMBSTONE,
        }
    }

    /// Kind encoded by a meta byte (only bit 0 is meaningful)
    pub fn from_meta(meta: u8) -> Self {
        if meta & META_TOMBSTONE != 0 {
            RecordKind::Tombstone
        } else {
            RecordKind::Put
        }
    }
}

// =============================================================================
// Index Record
// =============================================================================

/// Location of a key's current value.
///
/// `value_offset` points past the record header, directly at the value bytes,
/// so a read is one seek plus exactly `value_len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRecord {
    /// Segment holding the value
    pub segment: SegmentName,
    /// Number of value bytes
    pub value_len: u32,
    /// Byte offset of the value within the segment file
    pub value_offset: u64,
}

impl IndexRecord {
    pub fn new(segment: SegmentName, value_len: u32, value_offset: u64) -> Self {
        Self {
            segment,
            value_len,
            value_offset,
        }
    }

    /// Offset one past the last value byte
    pub fn value_end(&self) -> u64 {
        self.value_offset + self.value_len as u64
    }
}

//! Record codec
//!
//! Pure encode/decode functions for one log record. No file handles here;
//! segments feed these functions the bytes they read.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::error::{HashKvError, Result};
use crate::segment::SegmentName;

use super::{IndexRecord, RecordKind, CHECKSUM_SIZE, HEADER_SIZE, MAX_FIELD_LEN};

/// Why a record could not be decoded.
///
/// None of these reach `Store` callers: a segment scan stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: u64, available: u64 },

    #[error("malformed record: {0}")]
    Malformed(&'static str),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a put record: `[crc][meta=0][keyLen][valLen][key][value]`
pub fn encode_put(key: &[u8], value: &[u8]) -> Result<Bytes> {
    encode(RecordKind::Put, key, value)
}

/// Encode a tombstone record: `[crc][meta=1][keyLen][valLen=0][key]`
pub fn encode_tombstone(key: &[u8]) -> Result<Bytes> {
    encode(RecordKind::Tombstone, key, &[])
}

fn encode(kind: RecordKind, key: &[u8], value: &[u8]) -> Result<Bytes> {
    let key_len = field_len(key.len())?;
    let value_len = field_len(value.len())?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
    buf.put_u64(0); // checksum placeholder
    buf.put_u8(kind.meta());
    buf.put_u32(key_len);
    buf.put_u32(value_len);
    buf.put_slice(key);
    buf.put_slice(value);

    let crc = crc32fast::hash(&buf[CHECKSUM_SIZE..]);
    buf[..CHECKSUM_SIZE].copy_from_slice(&(crc as u64).to_be_bytes());

    Ok(buf.freeze())
}

fn field_len(len: usize) -> Result<u32> {
    if len > MAX_FIELD_LEN {
        return Err(HashKvError::RecordTooLarge { len: len as u64 });
    }
    Ok(len as u32)
}

// =============================================================================
// Decoding
// =============================================================================

/// The fixed 17-byte prefix of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    pub meta: u8,
    pub key_len: u32,
    pub value_len: u32,
}

impl RecordHeader {
    /// Parse the header from the first `HEADER_SIZE` bytes of `buf`
    pub fn parse(mut buf: &[u8]) -> std::result::Result<Self, DecodeError> {
        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                needed: HEADER_SIZE as u64,
                available: buf.len() as u64,
            });
        }

        let stored = buf.get_u64();
        let meta = buf.get_u8();
        let key_len = buf.get_u32();
        let value_len = buf.get_u32();

        // A CRC32 widened to 8 bytes never sets the upper half
        let checksum = u32::try_from(stored)
            .map_err(|_| DecodeError::Malformed("checksum exceeds 32 bits"))?;

        if key_len as usize > MAX_FIELD_LEN || value_len as usize > MAX_FIELD_LEN {
            return Err(DecodeError::Malformed("negative length field"));
        }

        let header = Self {
            checksum,
            meta,
            key_len,
            value_len,
        };

        if header.kind() == RecordKind::Tombstone && value_len != 0 {
            return Err(DecodeError::Malformed("tombstone with a value"));
        }

        Ok(header)
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::from_meta(self.meta)
    }

    /// Bytes following the header (key + value)
    pub fn body_len(&self) -> u64 {
        self.key_len as u64 + self.value_len as u64
    }

    /// Total bytes this record occupies on disk
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.body_len()
    }

    /// CRC over meta, both lengths and the body
    fn compute_checksum(&self, body: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.meta]);
        hasher.update(&self.key_len.to_be_bytes());
        hasher.update(&self.value_len.to_be_bytes());
        hasher.update(body);
        hasher.finalize()
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub key: String,
    pub kind: RecordKind,
    /// Value location for a put, `None` for a tombstone
    pub location: Option<IndexRecord>,
}

/// Verify and decode the body that follows `header`.
///
/// `record_offset` is where the header starts inside `segment`; the returned
/// location points at the value bytes.
pub fn decode_body(
    header: &RecordHeader,
    body: &[u8],
    segment: SegmentName,
    record_offset: u64,
) -> std::result::Result<DecodedRecord, DecodeError> {
    if (body.len() as u64) < header.body_len() {
        return Err(DecodeError::Truncated {
            needed: header.body_len(),
            available: body.len() as u64,
        });
    }
    let body = &body[..header.body_len() as usize];

    let computed = header.compute_checksum(body);
    if computed != header.checksum {
        return Err(DecodeError::ChecksumMismatch {
            stored: header.checksum,
            computed,
        });
    }

    let key_bytes = &body[..header.key_len as usize];
    let key = std::str::from_utf8(key_bytes)
        .map_err(|_| DecodeError::Malformed("key is not valid UTF-8"))?
        .to_string();

    let kind = header.kind();
    let location = match kind {
        RecordKind::Put => Some(IndexRecord::new(
            segment,
            header.value_len,
            record_offset + HEADER_SIZE as u64 + header.key_len as u64,
        )),
        RecordKind::Tombstone => None,
    };

    Ok(DecodedRecord {
        key,
        kind,
        location,
    })
}

/// Decode one record from the front of `buf`.
///
/// Returns the record and the number of bytes it occupied.
pub fn decode(
    buf: &[u8],
    segment: SegmentName,
    record_offset: u64,
) -> std::result::Result<(DecodedRecord, usize), DecodeError> {
    let header = RecordHeader::parse(buf)?;
    let record_len = header.record_len();
    if (buf.len() as u64) < record_len {
        return Err(DecodeError::Truncated {
            needed: record_len,
            available: buf.len() as u64,
        });
    }

    let record = decode_body(&header, &buf[HEADER_SIZE..], segment, record_offset)?;
    Ok((record, record_len as usize))
}

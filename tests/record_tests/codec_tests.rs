//! Tests for the record codec
//!
//! These tests verify:
//! - Bit-exact put and tombstone layouts (big-endian, CRC widened to 8 bytes)
//! - Value locations computed past the header and key
//! - Checksum, truncation and malformed-header detection

use hashkv::record::{
    decode, encode_put, encode_tombstone, DecodeError, RecordHeader, RecordKind, HEADER_SIZE,
};
use hashkv::segment::SegmentName;

// =============================================================================
// Helper Functions
// =============================================================================

fn segment() -> SegmentName {
    SegmentName::new(1_700_000_000_000)
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_put_layout() {
    let bytes = encode_put(b"a", b"bc").unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + 1 + 2);

    // Everything the checksum covers
    assert_eq!(&bytes[8..], &[0, 0, 0, 0, 1, 0, 0, 0, 2, b'a', b'b', b'c']);

    // CRC32 stored big-endian in the low half of 8 bytes
    let crc = crc32fast::hash(&bytes[8..]);
    assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
    assert_eq!(&bytes[4..8], &crc.to_be_bytes());
}

#[test]
fn test_encode_tombstone_layout() {
    let bytes = encode_tombstone(b"key").unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + 3);
    assert_eq!(bytes[8], 0x01); // tombstone bit
    assert_eq!(&bytes[9..13], &3u32.to_be_bytes());
    assert_eq!(&bytes[13..17], &0u32.to_be_bytes());
    assert_eq!(&bytes[17..], b"key");
}

#[test]
fn test_encode_empty_value() {
    let bytes = encode_put(b"k", b"").unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + 1);
    assert_eq!(bytes[8], 0x00);
}

#[test]
fn test_record_kind_uses_bit_zero_only() {
    assert_eq!(RecordKind::from_meta(0x00), RecordKind::Put);
    assert_eq!(RecordKind::from_meta(0x01), RecordKind::Tombstone);
    assert_eq!(RecordKind::from_meta(0x02), RecordKind::Put);
    assert_eq!(RecordKind::from_meta(0x03), RecordKind::Tombstone);
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_put() {
    let bytes = encode_put(b"hello", b"world!").unwrap();

    let (record, consumed) = decode(&bytes, segment(), 100).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(record.key, "hello");
    assert_eq!(record.kind, RecordKind::Put);

    let location = record.location.unwrap();
    assert_eq!(location.segment, segment());
    assert_eq!(location.value_len, 6);
    assert_eq!(location.value_offset, 100 + HEADER_SIZE as u64 + 5);
}

#[test]
fn test_decode_tombstone() {
    let bytes = encode_tombstone(b"gone").unwrap();

    let (record, consumed) = decode(&bytes, segment(), 0).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(record.key, "gone");
    assert_eq!(record.kind, RecordKind::Tombstone);
    assert!(record.location.is_none());
}

#[test]
fn test_decode_first_of_two_records() {
    let mut buf = encode_put(b"k1", b"v1").unwrap().to_vec();
    let first_len = buf.len();
    buf.extend_from_slice(&encode_put(b"k2", b"v2").unwrap());

    let (first, consumed) = decode(&buf, segment(), 0).unwrap();
    assert_eq!(first.key, "k1");
    assert_eq!(consumed, first_len);

    let (second, _) = decode(&buf[consumed..], segment(), consumed as u64).unwrap();
    assert_eq!(second.key, "k2");
    assert_eq!(
        second.location.unwrap().value_offset,
        (first_len + HEADER_SIZE + 2) as u64
    );
}

#[test]
fn test_decode_detects_flipped_value_byte() {
    let mut bytes = encode_put(b"key", b"value").unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = decode(&bytes, segment(), 0);

    assert!(matches!(result, Err(DecodeError::ChecksumMismatch { .. })));
}

#[test]
fn test_decode_detects_flipped_meta_byte() {
    let mut bytes = encode_put(b"key", b"").unwrap().to_vec();
    bytes[8] = 0x02; // still a put, but not what was checksummed

    let result = decode(&bytes, segment(), 0);

    assert!(matches!(result, Err(DecodeError::ChecksumMismatch { .. })));
}

#[test]
fn test_decode_truncated_header() {
    let bytes = encode_put(b"key", b"value").unwrap();

    let result = decode(&bytes[..10], segment(), 0);

    assert!(matches!(result, Err(DecodeError::Truncated { .. })));
}

#[test]
fn test_decode_truncated_body() {
    let bytes = encode_put(b"key", b"value").unwrap();

    let result = decode(&bytes[..bytes.len() - 2], segment(), 0);

    assert!(matches!(result, Err(DecodeError::Truncated { .. })));
}

#[test]
fn test_header_rejects_wide_checksum() {
    let mut bytes = encode_put(b"k", b"v").unwrap().to_vec();
    bytes[0] = 0x01;

    let result = RecordHeader::parse(&bytes);

    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_header_rejects_negative_length() {
    let mut bytes = encode_put(b"k", b"v").unwrap().to_vec();
    bytes[9] = 0x80; // key length sign bit

    let result = RecordHeader::parse(&bytes);

    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_header_rejects_tombstone_with_value() {
    let mut bytes = encode_tombstone(b"k").unwrap().to_vec();
    bytes[16] = 0x01; // value length 1

    let result = RecordHeader::parse(&bytes);

    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_header_lengths() {
    let bytes = encode_put(b"abcd", b"123456").unwrap();

    let header = RecordHeader::parse(&bytes).unwrap();

    assert_eq!(header.key_len, 4);
    assert_eq!(header.value_len, 6);
    assert_eq!(header.body_len(), 10);
    assert_eq!(header.record_len(), bytes.len() as u64);
    assert_eq!(header.kind(), RecordKind::Put);
}

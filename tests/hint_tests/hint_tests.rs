//! Tests for hint files
//!
//! These tests verify:
//! - Bit-exact hint layout
//! - Loading a hint gives the same entries as scanning the segment
//! - Missing or damaged hint files are reported as absent, never partial

use std::collections::HashMap;
use std::fs::{self, OpenOptions};

use hashkv::hint::HintFile;
use hashkv::record::IndexRecord;
use hashkv::segment::{ActiveSegment, SegmentName, SegmentRead};
use hashkv::{HashKvError, SyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Segment with overwrites and a delete; returns its name and scanned index
fn setup_segment(dir: &TempDir) -> (SegmentName, HashMap<String, IndexRecord>) {
    let name = SegmentName::with_generation(1_000, 1);
    let segment = ActiveSegment::create(dir.path(), name, SyncStrategy::EveryWrite).unwrap();

    segment.append("apple", b"red").unwrap();
    segment.append("banana", b"yellow").unwrap();
    segment.append("cherry", b"dark red").unwrap();
    segment.append("apple", b"green").unwrap();
    segment.append_tombstone("banana").unwrap();
    segment.append("", b"empty key").unwrap();
    segment.close_writer().unwrap();

    let mut index = HashMap::new();
    segment.load(&mut index).unwrap();
    (name, index)
}

// =============================================================================
// Save / Load Tests
// =============================================================================

#[test]
fn test_hint_matches_segment_scan() {
    let dir = setup_temp_dir();
    let (name, scanned) = setup_segment(&dir);

    let hint = HintFile::new(dir.path(), name);
    hint.save(&scanned).unwrap();
    let loaded = hint.load().unwrap().expect("hint should load");

    assert_eq!(loaded, scanned);
    assert_eq!(loaded.len(), 3);
    assert!(!loaded.contains_key("banana"));
}

#[test]
fn test_hint_file_name() {
    let dir = setup_temp_dir();
    let hint = HintFile::new(dir.path(), SegmentName::with_generation(1_000, 2));

    assert_eq!(hint.path(), dir.path().join("1000-2.hint"));
    assert!(!hint.exists());
}

#[test]
fn test_hint_layout() {
    let dir = setup_temp_dir();
    let name = SegmentName::new(5);
    let mut entries = HashMap::new();
    entries.insert("k".to_string(), IndexRecord::new(name, 3, 18));

    let hint = HintFile::new(dir.path(), name);
    hint.save(&entries).unwrap();
    let bytes = fs::read(hint.path()).unwrap();

    let body: Vec<u8> = vec![0, 0, 0, 1, 0, 0, 0, 3, b'k', 0, 0, 0, 18];
    let crc = crc32fast::hash(&body) as u64;
    assert_eq!(&bytes[..8], &crc.to_be_bytes());
    assert_eq!(&bytes[8..], &body[..]);
}

#[test]
fn test_hint_entries_in_offset_order() {
    let dir = setup_temp_dir();
    let name = SegmentName::new(5);
    let mut entries = HashMap::new();
    entries.insert("b".to_string(), IndexRecord::new(name, 1, 40));
    entries.insert("a".to_string(), IndexRecord::new(name, 1, 18));

    let hint = HintFile::new(dir.path(), name);
    hint.save(&entries).unwrap();
    let bytes = fs::read(hint.path()).unwrap();

    // First tuple after the checksum holds the lowest offset
    assert_eq!(bytes[8 + 8], b'a');
}

#[test]
fn test_empty_hint() {
    let dir = setup_temp_dir();
    let hint = HintFile::new(dir.path(), SegmentName::new(5));

    hint.save(&HashMap::new()).unwrap();

    assert_eq!(fs::metadata(hint.path()).unwrap().len(), 8);
    assert_eq!(hint.load().unwrap(), Some(HashMap::new()));
}

#[test]
fn test_save_replaces_existing_hint() {
    let dir = setup_temp_dir();
    let name = SegmentName::new(5);
    let hint = HintFile::new(dir.path(), name);

    let mut first = HashMap::new();
    first.insert("old".to_string(), IndexRecord::new(name, 1, 20));
    hint.save(&first).unwrap();

    let mut second = HashMap::new();
    second.insert("new".to_string(), IndexRecord::new(name, 2, 20));
    hint.save(&second).unwrap();

    assert_eq!(hint.load().unwrap(), Some(second));
}

#[test]
fn test_save_rejects_offset_beyond_i32() {
    let dir = setup_temp_dir();
    let name = SegmentName::new(5);
    let mut entries = HashMap::new();
    entries.insert("k".to_string(), IndexRecord::new(name, 1, i32::MAX as u64 + 1));

    let result = HintFile::new(dir.path(), name).save(&entries);

    assert!(matches!(result, Err(HashKvError::RecordTooLarge { .. })));
}

// =============================================================================
// Missing and Damaged Hint Tests
// =============================================================================

#[test]
fn test_missing_hint_is_none() {
    let dir = setup_temp_dir();
    let hint = HintFile::new(dir.path(), SegmentName::new(5));

    assert_eq!(hint.load().unwrap(), None);
}

#[test]
fn test_damaged_hint_is_none() {
    let dir = setup_temp_dir();
    let (name, scanned) = setup_segment(&dir);
    let hint = HintFile::new(dir.path(), name);
    hint.save(&scanned).unwrap();

    let mut bytes = fs::read(hint.path()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(hint.path(), &bytes).unwrap();

    assert_eq!(hint.load().unwrap(), None);
}

#[test]
fn test_truncated_hint_is_none() {
    let dir = setup_temp_dir();
    let (name, scanned) = setup_segment(&dir);
    let hint = HintFile::new(dir.path(), name);
    hint.save(&scanned).unwrap();

    let len = fs::metadata(hint.path()).unwrap().len();
    let file = OpenOptions::new().write(true).open(hint.path()).unwrap();
    file.set_len(len - 2).unwrap();

    assert_eq!(hint.load().unwrap(), None);
}

#[test]
fn test_hint_shorter_than_checksum_is_none() {
    let dir = setup_temp_dir();
    let hint = HintFile::new(dir.path(), SegmentName::new(5));
    fs::write(hint.path(), [0u8; 3]).unwrap();

    assert_eq!(hint.load().unwrap(), None);
}

#[test]
fn test_delete_hint() {
    let dir = setup_temp_dir();
    let hint = HintFile::new(dir.path(), SegmentName::new(5));
    hint.save(&HashMap::new()).unwrap();
    assert!(hint.exists());

    hint.delete().unwrap();
    assert!(!hint.exists());

    // Deleting again is fine
    hint.delete().unwrap();
}

//! Hint Files
//!
//! A checksummed snapshot of the index entries belonging to one segment, so a
//! reload can skip scanning that segment's log.
//!
//! ## File Format (big-endian)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ CRC32 widened to 8 bytes (covers every tuple below)     │
//! ├─────────────────────────────────────────────────────────┤
//! │ [KeyLen: i32][ValLen: i32][Key][ValueOffset: i32]       │
//! │ ... repeated for each live key ...                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A hint file is written once, never modified, and deleted together with its
//! segment. One that fails its checksum is ignored entirely.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{HashKvError, Result};
use crate::record::{IndexRecord, CHECKSUM_SIZE, MAX_FIELD_LEN};
use crate::segment::{hint_path, SegmentName};

/// Size of one tuple excluding the key bytes: key len + value len + offset
const TUPLE_FIXED_SIZE: usize = 12;

/// Sidecar index snapshot for one segment
#[derive(Debug, Clone)]
pub struct HintFile {
    path: PathBuf,
    segment: SegmentName,
}

impl HintFile {
    /// Hint file of `segment` inside `dir`
    pub fn new(dir: &Path, segment: SegmentName) -> Self {
        Self {
            path: hint_path(dir, segment),
            segment,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the hint file for `entries`, replacing any existing one.
    ///
    /// The body is buffered first so its CRC can lead the file.
    pub fn save(&self, entries: &HashMap<String, IndexRecord>) -> Result<()> {
        // Log order keeps the file stable for identical inputs
        let mut ordered: Vec<_> = entries.iter().collect();
        ordered.sort_by_key(|(_, record)| record.value_offset);

        let mut body = BytesMut::new();
        for (key, record) in ordered {
            debug_assert_eq!(record.segment, self.segment);

            if key.len() > MAX_FIELD_LEN {
                return Err(HashKvError::RecordTooLarge {
                    len: key.len() as u64,
                });
            }
            if record.value_offset > MAX_FIELD_LEN as u64 {
                return Err(HashKvError::RecordTooLarge {
                    len: record.value_offset,
                });
            }

            body.put_u32(key.len() as u32);
            body.put_u32(record.value_len);
            body.put_slice(key.as_bytes());
            body.put_u32(record.value_offset as u32);
        }

        let crc = crc32fast::hash(&body);

        let mut file = File::create(&self.path)?;
        file.write_all(&(crc as u64).to_be_bytes())?;
        file.write_all(&body)?;
        file.sync_all()?;

        tracing::debug!(segment = %self.segment, keys = entries.len(), "Wrote hint file");
        Ok(())
    }

    /// Load the entries, or `None` if the file is missing or fails validation
    pub fn load(&self) -> Result<Option<HashMap<String, IndexRecord>>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match self.parse(&data) {
            Ok(entries) => Ok(Some(entries)),
            Err(reason) => {
                tracing::warn!(segment = %self.segment, reason, "Ignoring damaged hint file");
                Ok(None)
            }
        }
    }

    fn parse(&self, data: &[u8]) -> std::result::Result<HashMap<String, IndexRecord>, &'static str> {
        if data.len() < CHECKSUM_SIZE {
            return Err("shorter than its checksum");
        }

        let mut buf = data;
        let stored = buf.get_u64();
        let computed = crc32fast::hash(buf);
        if stored != computed as u64 {
            return Err("checksum does not match");
        }

        let mut entries = HashMap::new();
        while buf.has_remaining() {
            if buf.remaining() < TUPLE_FIXED_SIZE {
                return Err("truncated entry");
            }
            let key_len = buf.get_u32() as usize;
            let value_len = buf.get_u32();
            if key_len > MAX_FIELD_LEN || value_len as usize > MAX_FIELD_LEN {
                return Err("negative length field");
            }
            if buf.remaining() < key_len + 4 {
                return Err("truncated entry");
            }

            let key = std::str::from_utf8(&buf[..key_len])
                .map_err(|_| "key is not valid UTF-8")?
                .to_string();
            buf.advance(key_len);
            let value_offset = buf.get_u32();
            if value_offset as usize > MAX_FIELD_LEN {
                return Err("negative value offset");
            }

            entries.insert(
                key,
                IndexRecord::new(self.segment, value_len, value_offset as u64),
            );
        }

        Ok(entries)
    }

    /// Remove the hint file if it exists
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

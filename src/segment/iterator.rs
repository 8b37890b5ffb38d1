//! Segment Iterator
//!
//! Sequential scan over the records of one segment file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::record::{decode_body, DecodeError, IndexRecord, RecordHeader, RecordKind, HEADER_SIZE};

use super::SegmentName;

/// Why a scan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStop {
    /// Every byte of the file was a valid record
    EndOfFile,

    /// The last record was cut short (expected after a crash mid-append)
    TruncatedTail { offset: u64 },

    /// A record failed validation before the end of the file
    Corrupted { offset: u64, reason: String },
}

/// What a scan saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Put records yielded
    pub records: u64,
    /// Tombstones yielded
    pub tombstones: u64,
    /// Bytes covered by valid records
    pub valid_bytes: u64,
    pub stop: ScanStop,
}

impl ScanSummary {
    /// True when the scan consumed the whole file
    pub fn is_clean(&self) -> bool {
        self.stop == ScanStop::EndOfFile
    }
}

/// Iterator over `(key, location)` pairs, `None` location meaning tombstone.
///
/// The scan is bounded by the file length at creation time and ends silently
/// at the first truncated or damaged record; nothing after it is trusted.
pub struct SegmentIter {
    name: SegmentName,
    reader: BufReader<File>,
    /// Offset of the next record
    offset: u64,
    file_len: u64,
    records: u64,
    tombstones: u64,
    stop: Option<ScanStop>,
}

impl SegmentIter {
    pub(super) fn open(path: &Path, name: SegmentName) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            name,
            reader: BufReader::new(file),
            offset: 0,
            file_len,
            records: 0,
            tombstones: 0,
            stop: None,
        })
    }

    /// Summary so far (final once the iterator returned `None`)
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            records: self.records,
            tombstones: self.tombstones,
            valid_bytes: self.offset,
            stop: self.stop.clone().unwrap_or(ScanStop::EndOfFile),
        }
    }

    pub fn into_summary(self) -> ScanSummary {
        self.summary()
    }

    fn finish(&mut self, stop: ScanStop) -> Option<Result<(String, Option<IndexRecord>)>> {
        match &stop {
            ScanStop::EndOfFile => {}
            ScanStop::TruncatedTail { offset } => {
                tracing::debug!(segment = %self.name, offset, "Truncated record at end of segment");
            }
            ScanStop::Corrupted { offset, reason } => {
                tracing::warn!(
                    segment = %self.name,
                    offset,
                    reason = %reason,
                    "Corrupted record, ignoring the rest of the segment"
                );
            }
        }
        self.stop = Some(stop);
        None
    }

    /// Read `buf.len()` bytes; `Ok(false)` if the file ended first
    fn read_fully(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        match self.reader.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Iterator for SegmentIter {
    type Item = Result<(String, Option<IndexRecord>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop.is_some() {
            return None;
        }

        let offset = self.offset;
        let remaining = self.file_len - offset;
        if remaining == 0 {
            return self.finish(ScanStop::EndOfFile);
        }
        if remaining < HEADER_SIZE as u64 {
            return self.finish(ScanStop::TruncatedTail { offset });
        }

        // Read header
        let mut header_buf = [0u8; HEADER_SIZE];
        match self.read_fully(&mut header_buf) {
            Ok(true) => {}
            Ok(false) => return self.finish(ScanStop::TruncatedTail { offset }),
            Err(e) => {
                self.stop = Some(ScanStop::TruncatedTail { offset });
                return Some(Err(e.into()));
            }
        }

        let header = match RecordHeader::parse(&header_buf) {
            Ok(header) => header,
            Err(e) => {
                return self.finish(ScanStop::Corrupted {
                    offset,
                    reason: e.to_string(),
                })
            }
        };

        // Lengths reaching past the end can only be a torn final write
        if header.record_len() > remaining {
            return self.finish(ScanStop::TruncatedTail { offset });
        }

        // Read key + value
        let mut body = vec![0u8; header.body_len() as usize];
        match self.read_fully(&mut body) {
            Ok(true) => {}
            Ok(false) => return self.finish(ScanStop::TruncatedTail { offset }),
            Err(e) => {
                self.stop = Some(ScanStop::TruncatedTail { offset });
                return Some(Err(e.into()));
            }
        }

        let record = match decode_body(&header, &body, self.name, offset) {
            Ok(record) => record,
            Err(e @ DecodeError::Truncated { .. }) => {
                tracing::trace!(segment = %self.name, offset, error = %e, "Short record body");
                return self.finish(ScanStop::TruncatedTail { offset });
            }
            Err(e) => {
                return self.finish(ScanStop::Corrupted {
                    offset,
                    reason: e.to_string(),
                })
            }
        };

        self.offset += header.record_len();
        match record.kind {
            RecordKind::Put => self.records += 1,
            RecordKind::Tombstone => self.tombstones += 1,
        }

        Some(Ok((record.key, record.location)))
    }
}

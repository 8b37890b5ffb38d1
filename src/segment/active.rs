//! Active Segment
//!
//! The single writable segment: append-only writer plus the sealed read path.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::SyncStrategy;
use crate::error::{HashKvError, Result};
use crate::record::{encode_put, encode_tombstone, IndexRecord, HEADER_SIZE};

use super::{segment_path, Segment, SegmentIter, SegmentName, SegmentRead};

/// Append handle plus fsync bookkeeping
struct SegmentWriter {
    file: File,
    sync_strategy: SyncStrategy,
    /// Appends written since the last fsync
    unsynced: usize,
}

impl SegmentWriter {
    fn maybe_sync(&mut self) -> std::io::Result<()> {
        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }
}

/// Writable segment
///
/// ## Concurrency:
/// - `writer`: Mutex making the byte write and the size advance one unit
/// - `size`: published inside the writer lock, read lock-free by `size()`
/// - Reads go through the embedded `Segment` and never take the writer lock
pub struct ActiveSegment {
    segment: Segment,
    writer: Mutex<Option<SegmentWriter>>,
    size: AtomicU64,
}

impl ActiveSegment {
    /// Create a new, empty segment file in `dir`.
    ///
    /// Fails if a file with that name already exists.
    pub fn create(dir: &Path, name: SegmentName, sync_strategy: SyncStrategy) -> Result<Self> {
        let path = segment_path(dir, name);
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;
        let reader = File::open(&path)?;

        tracing::debug!(segment = %name, "Created segment file");

        Ok(Self {
            segment: Segment::from_file(name, path, reader),
            writer: Mutex::new(Some(SegmentWriter {
                file,
                sync_strategy,
                unsynced: 0,
            })),
            size: AtomicU64::new(0),
        })
    }

    /// Append a put record and return the location of its value
    pub fn append(&self, key: &str, value: &[u8]) -> Result<IndexRecord> {
        let bytes = encode_put(key.as_bytes(), value)?;
        let record_offset = self.write_record(&bytes)?;

        Ok(IndexRecord::new(
            self.segment.name(),
            value.len() as u32,
            record_offset + (HEADER_SIZE + key.len()) as u64,
        ))
    }

    /// Append a tombstone record
    pub fn append_tombstone(&self, key: &str) -> Result<()> {
        let bytes = encode_tombstone(key.as_bytes())?;
        self.write_record(&bytes)?;
        Ok(())
    }

    /// Write one encoded record; returns the offset it starts at
    fn write_record(&self, bytes: &[u8]) -> Result<u64> {
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| HashKvError::SegmentClosed(self.segment.name().to_string()))?;

        let offset = self.size.load(Ordering::Acquire);

        let written = match writer.file.write_all(bytes) {
            Ok(()) => writer.maybe_sync(),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // Cut any partial record so the next append lands at `offset`
            if let Err(truncate_err) = writer.file.set_len(offset) {
                // The file may now end in bytes `size` does not count; stop
                // appending rather than misplace every later record
                guard.take();
                tracing::error!(
                    segment = %self.segment.name(),
                    offset,
                    error = %truncate_err,
                    "Failed to roll back partial append, segment closed for writes"
                );
            }
            return Err(e.into());
        }

        self.size
            .store(offset + bytes.len() as u64, Ordering::Release);
        tracing::trace!(segment = %self.segment.name(), offset, len = bytes.len(), "Appended record");

        Ok(offset)
    }

    /// Bytes durably appended so far
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// True until the writer is closed
    pub fn is_writable(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Force appended bytes to disk
    pub fn sync(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Stop accepting appends; the segment stays readable
    pub fn close_writer(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Finish writing and keep only the read side
    pub fn seal(self) -> Result<Segment> {
        self.close_writer()?;
        Ok(self.segment)
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        self.segment.path()
    }
}

impl SegmentRead for ActiveSegment {
    fn name(&self) -> SegmentName {
        self.segment.name()
    }

    fn read_value(&self, record: &IndexRecord) -> Result<Vec<u8>> {
        self.segment.read_value(record)
    }

    fn iter(&self) -> Result<SegmentIter> {
        self.segment.iter()
    }

    fn close(&self) -> Result<()> {
        self.close_writer()?;
        self.segment.close()
    }
}

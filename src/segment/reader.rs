//! Sealed Segment
//!
//! Read-only view over one closed log file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{HashKvError, Result};
use crate::record::IndexRecord;

use super::{segment_path, SegmentIter, SegmentName, SegmentRead};

/// Immutable segment supporting scans and point reads
///
/// ## Concurrency:
/// - `file`: Mutex around the seek + read pair, shared across reader threads
/// - Scans open their own handle, so they never move the point-read cursor
pub struct Segment {
    name: SegmentName,
    path: PathBuf,
    /// Point-read handle (None once closed)
    file: Mutex<Option<File>>,
}

impl Segment {
    /// Open an existing segment in `dir`
    pub fn open(dir: &Path, name: SegmentName) -> Result<Self> {
        let path = segment_path(dir, name);
        let file = File::open(&path)?;
        Ok(Self::from_file(name, path, file))
    }

    pub(super) fn from_file(name: SegmentName, path: PathBuf, file: File) -> Self {
        Self {
            name,
            path,
            file: Mutex::new(Some(file)),
        }
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file on disk
    pub fn file_len(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

impl SegmentRead for Segment {
    fn name(&self) -> SegmentName {
        self.name
    }

    fn read_value(&self, record: &IndexRecord) -> Result<Vec<u8>> {
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| HashKvError::SegmentClosed(self.name.to_string()))?;

        file.seek(SeekFrom::Start(record.value_offset))?;
        let mut value = vec![0u8; record.value_len as usize];
        file.read_exact(&mut value).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                HashKvError::Corruption(format!(
                    "value at {}..{} extends past the end of segment {}",
                    record.value_offset,
                    record.value_end(),
                    self.name
                ))
            } else {
                HashKvError::Io(e)
            }
        })?;

        Ok(value)
    }

    fn iter(&self) -> Result<SegmentIter> {
        SegmentIter::open(&self.path, self.name)
    }

    fn close(&self) -> Result<()> {
        // Dropping the handle closes it
        self.file.lock().take();
        Ok(())
    }
}

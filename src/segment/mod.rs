//! Segment Module
//!
//! Append-only log files of records.
//!
//! ## Responsibilities
//! - Sealed segments: immutable, read-only, compaction inputs
//! - The active segment: the single writable segment, size-tracked for rotation
//! - Sequential scans that stop at the first damaged record
//! - Point reads by value offset
//!
//! Both kinds share the read capability (`SegmentRead`); only
//! `ActiveSegment` can append.

mod active;
mod iterator;
mod name;
mod reader;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::record::IndexRecord;

pub use active::ActiveSegment;
pub use iterator::{ScanStop, ScanSummary, SegmentIter};
pub use name::{SegmentName, HINT_SUFFIX};
pub use reader::Segment;

/// Read operations shared by sealed and active segments
pub trait SegmentRead: Send + Sync {
    /// Name of the underlying file
    fn name(&self) -> SegmentName;

    /// Read exactly `record.value_len` bytes at `record.value_offset`
    fn read_value(&self, record: &IndexRecord) -> Result<Vec<u8>>;

    /// Lazy scan from byte 0 over the records present right now
    fn iter(&self) -> Result<SegmentIter>;

    /// Release the file handles; later reads fail with `SegmentClosed`
    fn close(&self) -> Result<()>;

    /// Replay this segment into `index`: puts overwrite, tombstones remove
    fn load(&self, index: &mut HashMap<String, IndexRecord>) -> Result<ScanSummary> {
        let mut iter = self.iter()?;
        for entry in iter.by_ref() {
            let (key, location) = entry?;
            match location {
                Some(record) => {
                    index.insert(key, record);
                }
                None => {
                    index.remove(&key);
                }
            }
        }
        Ok(iter.into_summary())
    }

    /// Scan the whole segment without touching any index
    fn verify(&self) -> Result<ScanSummary> {
        let mut iter = self.iter()?;
        for entry in iter.by_ref() {
            entry?;
        }
        Ok(iter.into_summary())
    }
}

/// Path of a segment file inside `dir`
pub fn segment_path(dir: &Path, name: SegmentName) -> PathBuf {
    dir.join(name.to_string())
}

/// Path of a segment's hint file inside `dir`
pub fn hint_path(dir: &Path, name: SegmentName) -> PathBuf {
    dir.join(name.hint_file_name())
}

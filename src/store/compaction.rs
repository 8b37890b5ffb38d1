//! Compaction
//!
//! Folds the sealed segments pairwise, oldest first, into one merged segment
//! holding only live values, then repairs the index and removes the inputs.
//!
//! Per pair the order is fixed:
//! 1. write the merged segment and its hint file
//! 2. publish the merged segment to readers
//! 3. re-point index entries that still reference the inputs
//! 4. evict the inputs from the segment cache, then unlink them
//!
//! The active segment is never an input. Tombstones are dropped only when the
//! left input is the oldest sealed segment; otherwise they are copied into the
//! merged segment, which then gets no hint file so reloads replay them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{HashKvError, Result};
use crate::hint::HintFile;
use crate::record::IndexRecord;
use crate::segment::{ActiveSegment, SegmentName, SegmentRead};

use super::Store;

/// What one `do_compaction` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Sealed segments folded together
    pub segments_merged: usize,
    /// Pairs merged
    pub pairs: usize,
    /// Live keys written into merged segments (across all pairs)
    pub keys_written: usize,
    /// Index entries moved to a merged segment
    pub keys_repointed: usize,
    /// Name of the final merged segment, if any pair was compacted
    pub output: Option<SegmentName>,
}

impl Store {
    /// Compact all sealed segments into one.
    ///
    /// A no-op with fewer than two sealed segments. Safe to call while reads
    /// and writes are in progress.
    pub fn do_compaction(&self) -> Result<CompactionStats> {
        self.ensure_ready()?;
        let _compaction_guard = self.compaction_lock.lock();

        let started = Instant::now();
        let sealed = self.sealed_segments();
        let mut stats = CompactionStats::default();

        if sealed.len() < 2 {
            tracing::debug!(sealed = sealed.len(), "Nothing to compact");
            return Ok(stats);
        }

        stats.segments_merged = sealed.len();
        let mut inputs = sealed.into_iter();
        let Some(mut left) = inputs.next() else {
            return Ok(stats);
        };
        // The fold starts at the oldest sealed segment, so no tombstone is needed
        for right in inputs {
            left = self.compact_pair(left, right, false, &mut stats)?;
        }

        stats.output = Some(left.name());
        tracing::info!(
            merged = stats.segments_merged,
            keys = stats.keys_written,
            repointed = stats.keys_repointed,
            output = %left.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compaction finished"
        );
        Ok(stats)
    }

    /// Merge two sealed segments and return the merged segment.
    ///
    /// Unlike `do_compaction` the pair need not start at the oldest sealed
    /// segment. When an older one exists, the pair's tombstones are carried
    /// into the output so stale values in that older segment stay deleted.
    pub fn compact_segments(
        &self,
        left: SegmentName,
        right: SegmentName,
    ) -> Result<SegmentName> {
        self.ensure_ready()?;
        if left == right {
            return Err(HashKvError::Storage(format!(
                "cannot compact segment {} with itself",
                left
            )));
        }
        let _compaction_guard = self.compaction_lock.lock();

        let (left, right) = {
            let active = self.active.read();
            let segments = self.segments.read();
            let resolve = |name: SegmentName| -> Result<Arc<dyn SegmentRead>> {
                if name == active.name() {
                    return Err(HashKvError::Storage(format!(
                        "segment {} is active and cannot be compacted",
                        name
                    )));
                }
                segments.get(&name).cloned().ok_or_else(|| {
                    HashKvError::Storage(format!("unknown segment {}", name))
                })
            };
            (resolve(left)?, resolve(right)?)
        };

        // Merge order follows the names, whatever order the caller used
        let (left, right) = if left.name() <= right.name() {
            (left, right)
        } else {
            (right, left)
        };

        // An older segment may still hold values the pair deleted
        let older_exists = self
            .sealed_segments()
            .iter()
            .any(|segment| segment.name() < left.name());

        let mut stats = CompactionStats::default();
        let merged = self.compact_pair(left, right, older_exists, &mut stats)?;
        Ok(merged.name())
    }

    /// Sealed segments oldest → newest (everything except the active one)
    fn sealed_segments(&self) -> Vec<Arc<dyn SegmentRead>> {
        // Holding `active` keeps a rotation from slipping in between
        let active = self.active.read();
        let active_name = active.name();
        self.segments
            .read()
            .iter()
            .filter(|(name, _)| **name != active_name)
            .map(|(_, segment)| segment.clone())
            .collect()
    }

    fn compact_pair(
        &self,
        left: Arc<dyn SegmentRead>,
        right: Arc<dyn SegmentRead>,
        keep_tombstones: bool,
        stats: &mut CompactionStats,
    ) -> Result<Arc<dyn SegmentRead>> {
        let dir = &self.config.data_dir;

        // Live keys of just these two segments; right replays last and wins
        let mut scoped = HashMap::new();
        let mut deleted = HashSet::new();
        for input in [&left, &right] {
            for entry in input.iter()? {
                let (key, location) = entry?;
                match location {
                    Some(record) => {
                        deleted.remove(&key);
                        scoped.insert(key, record);
                    }
                    None => {
                        scoped.remove(&key);
                        deleted.insert(key);
                    }
                }
            }
        }
        if !keep_tombstones {
            deleted.clear();
        }

        let merged_name = self.compacted_name(right.name());
        tracing::debug!(
            left = %left.name(),
            right = %right.name(),
            output = %merged_name,
            keys = scoped.len(),
            tombstones = deleted.len(),
            "Compacting segment pair"
        );

        let written = self.write_merged(merged_name, &left, &right, &scoped, &deleted);
        let (merged, new_locations) = match written {
            Ok(written) => written,
            Err(e) => {
                // A partial output must not be replayed on the next open
                remove_if_exists(&self.segment_path(merged_name));
                remove_if_exists(HintFile::new(dir, merged_name).path());
                return Err(e);
            }
        };

        // Readers may resolve the merged segment from here on
        self.segments.write().insert(merged_name, merged.clone());

        // Only entries still pointing at their pre-compaction location move
        let repointed = self.index.repoint_all(scoped.iter().filter_map(|(key, old)| {
            new_locations
                .get(key)
                .map(|new| (key.as_str(), *old, *new))
        }));

        // Evict, then unlink; in-flight reads keep their handles alive
        {
            let mut segments = self.segments.write();
            segments.remove(&left.name());
            segments.remove(&right.name());
        }
        for input in [&left, &right] {
            fs::remove_file(self.segment_path(input.name()))?;
            HintFile::new(dir, input.name()).delete()?;
        }

        stats.pairs += 1;
        stats.keys_written += new_locations.len();
        stats.keys_repointed += repointed;

        Ok(merged)
    }

    /// Copy every live value into a new segment, followed by `deleted` as
    /// tombstones, and write its hint file when there are no tombstones
    fn write_merged(
        &self,
        name: SegmentName,
        left: &Arc<dyn SegmentRead>,
        right: &Arc<dyn SegmentRead>,
        scoped: &HashMap<String, IndexRecord>,
        deleted: &HashSet<String>,
    ) -> Result<(Arc<dyn SegmentRead>, HashMap<String, IndexRecord>)> {
        let dir = &self.config.data_dir;
        let output = ActiveSegment::create(dir, name, self.config.sync_strategy)?;

        // Copy in log order so the merged file reads like the inputs did
        let mut live: Vec<(&String, &IndexRecord)> = scoped.iter().collect();
        live.sort_by_key(|(_, record)| (record.segment, record.value_offset));

        let mut new_locations = HashMap::with_capacity(live.len());
        for (key, old) in live {
            let source = if old.segment == left.name() { left } else { right };
            let value = source.read_value(old)?;
            let new = output.append(key, &value)?;
            new_locations.insert(key.clone(), new);
        }

        let mut tombstones: Vec<&String> = deleted.iter().collect();
        tombstones.sort();
        for key in tombstones {
            output.append_tombstone(key)?;
        }

        let merged: Arc<dyn SegmentRead> = Arc::new(output.seal()?);
        // A hint only lists live keys, so it would hide the tombstones
        if deleted.is_empty() {
            HintFile::new(dir, name).save(&new_locations)?;
        }

        Ok((merged, new_locations))
    }

    /// `<timestamp of right>-<generation + 1>`, bumped past leftovers on disk
    fn compacted_name(&self, right: SegmentName) -> SegmentName {
        let mut name = right.next_generation();
        while self.segment_path(name).exists() {
            name = name.next_generation();
        }
        name
    }
}

fn remove_if_exists(path: &std::path::Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial compaction output");
        }
    }
}

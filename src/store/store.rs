//! Store
//!
//! Owns the active segment, the sealed segments and the index; the component
//! callers interact with.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{HashKvError, Result};
use crate::hint::HintFile;
use crate::record::IndexRecord;
use crate::segment::{
    segment_path, ActiveSegment, ScanStop, Segment, SegmentName, SegmentRead, HINT_SUFFIX,
};

use super::scheduler::CompactionTask;
use super::Index;

/// Lifecycle of a store instance.
///
/// The opening phase (replaying segments) runs inside `Store::open`, before
/// any instance exists, so a store is first seen `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreState {
    /// Serving requests
    Ready = 0,
    /// Closed; every operation fails with `StoreClosed`
    Closed = 1,
}

impl StoreState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StoreState::Ready,
            _ => StoreState::Closed,
        }
    }
}

/// Log-structured hash-index key-value store
///
/// ## Concurrency Model
///
/// - **Writes** (put/delete/rotation): serialized by `write_lock`, so appends
///   and the index updates that follow them happen in the same order
/// - **Reads** (get): index lookup and segment resolution happen under the
///   `segments` read lock, then the value is read with no store lock held
/// - **Compaction**: one run at a time (`compaction_lock`); it publishes the
///   merged segment, re-points the index, and only then evicts and unlinks its
///   inputs. A reader that already resolved an input keeps its `Arc` (and its
///   open file handle) until the read finishes
///
/// Lock order: `write_lock` → `active` → `segments` → `index`.
pub struct Store {
    /// Store configuration
    pub(super) config: Config,

    /// Key → value location, the source of truth for liveness
    pub(super) index: Index,

    /// The segment currently receiving appends
    pub(super) active: RwLock<Arc<ActiveSegment>>,

    /// Every readable segment (sealed and active), ordered oldest → newest
    pub(super) segments: RwLock<BTreeMap<SegmentName, Arc<dyn SegmentRead>>>,

    /// Serializes put/delete/rotation
    write_lock: Mutex<()>,

    /// Serializes compaction runs
    pub(super) compaction_lock: Mutex<()>,

    /// Newest timestamp handed to a segment name
    last_timestamp: Mutex<u64>,

    /// Background compaction loop, if scheduled
    compaction_task: Mutex<Option<CompactionTask>>,

    state: AtomicU8,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Enumerate segment files and sort them oldest → newest
    /// 3. Replay each into the index (hint file if valid, else full scan)
    /// 4. Create a fresh active segment
    /// 5. Schedule background compaction if configured
    pub fn open(config: Config) -> Result<Arc<Self>> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let started = Instant::now();
        let dir = config.data_dir.clone();

        // Step 1: Discover segments
        let names = discover_segments(&dir)?;

        // Step 2: Replay into a private map (nobody else can see it yet)
        let mut entries = HashMap::new();
        let mut segments: BTreeMap<SegmentName, Arc<dyn SegmentRead>> = BTreeMap::new();
        for name in &names {
            let segment = Segment::open(&dir, *name)?;
            load_segment(&dir, &segment, &mut entries)?;
            segments.insert(*name, Arc::new(segment));
        }

        // Step 3: New active segment, strictly newer than anything on disk
        let mut last_timestamp = names.last().map(|n| n.timestamp()).unwrap_or(0);
        let active_name = next_segment_name(&mut last_timestamp);
        let active = Arc::new(ActiveSegment::create(
            &dir,
            active_name,
            config.sync_strategy,
        )?);
        segments.insert(active_name, active.clone());

        tracing::info!(
            segments = names.len(),
            keys = entries.len(),
            active = %active_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded store from {}",
            dir.display()
        );

        let compaction_period = config.compaction_period;
        let store = Arc::new(Self {
            config,
            index: Index::from_map(entries),
            active: RwLock::new(active),
            segments: RwLock::new(segments),
            write_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
            last_timestamp: Mutex::new(last_timestamp),
            compaction_task: Mutex::new(None),
            state: AtomicU8::new(StoreState::Ready as u8),
        });

        // Step 4: Background compaction
        if let Some(period) = compaction_period {
            store.schedule_compaction(period)?;
        }

        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Arc<Self>> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Key-Value Operations
    // =========================================================================

    /// Get a value by key; `Ok(None)` if absent or deleted
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_ready()?;

        // Resolve under the segments lock so compaction cannot evict in between
        let (record, segment) = {
            let segments = self.segments.read();
            let Some(record) = self.index.get(key) else {
                return Ok(None);
            };
            let segment = segments.get(&record.segment).cloned().ok_or_else(|| {
                HashKvError::Corruption(format!(
                    "index points at unknown segment {}",
                    record.segment
                ))
            })?;
            (record, segment)
        };

        let value = segment.read_value(&record)?;
        String::from_utf8(value).map(Some).map_err(|_| {
            HashKvError::Corruption(format!(
                "value of {:?} in segment {} is not valid UTF-8",
                key, record.segment
            ))
        })
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append to the active segment
    /// 3. Install the new location in the index
    /// 4. Rotate if the segment grew past `maximum_file_size`
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_ready()?;
        let _write_guard = self.write_lock.lock();

        let active = self.active.read().clone();
        let record = active.append(key, value.as_bytes())?;
        self.index.insert(key.to_string(), record);

        if active.size() > self.config.maximum_file_size {
            self.rotate_locked()?;
        }

        Ok(())
    }

    /// Delete a key
    ///
    /// Appends a tombstone, then drops the key from the index. Deleting an
    /// absent key still writes the tombstone.
    ///
    /// Tombstones grow the active segment like puts do, so a delete that
    /// pushes it past `maximum_file_size` rotates it as well.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.ensure_ready()?;
        let _write_guard = self.write_lock.lock();

        let active = self.active.read().clone();
        active.append_tombstone(key)?;
        self.index.remove(key);

        if active.size() > self.config.maximum_file_size {
            self.rotate_locked()?;
        }

        Ok(())
    }

    /// Seal the active segment and start a new one (write lock held)
    fn rotate_locked(&self) -> Result<()> {
        let mut active = self.active.write();

        let name = self.allocate_segment_name();
        let next = Arc::new(ActiveSegment::create(
            &self.config.data_dir,
            name,
            self.config.sync_strategy,
        )?);
        self.segments.write().insert(name, next.clone());

        let sealed = std::mem::replace(&mut *active, next);
        drop(active);

        sealed.close_writer()?;

        tracing::info!(
            sealed = %sealed.name(),
            size = sealed.size(),
            active = %name,
            "Rotated active segment"
        );
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Run `do_compaction` every `period` on a background thread.
    ///
    /// Replaces any previously scheduled task.
    pub fn schedule_compaction(self: &Arc<Self>, period: Duration) -> Result<()> {
        self.ensure_ready()?;
        if period.is_zero() {
            return Err(HashKvError::Config(
                "compaction period must be greater than 0".to_string(),
            ));
        }

        let task = CompactionTask::spawn(Arc::downgrade(self), period)?;
        // The replaced task is cancelled as it drops
        let previous = self.compaction_task.lock().replace(task);
        drop(previous);
        Ok(())
    }

    /// Close the store gracefully
    ///
    /// Cancels scheduled compaction, syncs and closes the active segment and
    /// releases every cached segment handle. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let previous = self.state.swap(StoreState::Closed as u8, Ordering::AcqRel);
        if StoreState::from_u8(previous) == StoreState::Closed {
            return Ok(());
        }

        // Waits for an in-flight compaction run
        let task = self.compaction_task.lock().take();
        drop(task);

        let _write_guard = self.write_lock.lock();
        let active = self.active.read().clone();
        active.close()?;

        for segment in self.segments.read().values() {
            segment.close()?;
        }

        // Nothing was written this session: leave no empty segment behind
        if active.size() == 0 {
            self.segments.write().remove(&active.name());
            match fs::remove_file(active.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(keys = self.index.len(), "Store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> StoreState {
        StoreState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of segments (sealed + active)
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Names of all segments, oldest → newest
    pub fn segment_names(&self) -> Vec<SegmentName> {
        self.segments.read().keys().copied().collect()
    }

    /// Name of the segment receiving appends
    pub fn active_segment_name(&self) -> SegmentName {
        self.active.read().name()
    }

    /// Byte length of the active segment
    pub fn active_segment_size(&self) -> u64 {
        self.active.read().size()
    }

    /// Location of a key's current value (for testing and debugging)
    pub fn locate(&self, key: &str) -> Option<IndexRecord> {
        self.index.get(key)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    pub(super) fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            StoreState::Ready => Ok(()),
            StoreState::Closed => Err(HashKvError::StoreClosed),
        }
    }

    /// Name for a new active segment, never reusing a timestamp
    fn allocate_segment_name(&self) -> SegmentName {
        next_segment_name(&mut self.last_timestamp.lock())
    }

    /// Path of a segment file in this store
    pub(super) fn segment_path(&self, name: SegmentName) -> PathBuf {
        segment_path(&self.config.data_dir, name)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(mut task) = self.compaction_task.get_mut().take() {
            task.cancel();
        }
    }
}

// =============================================================================
// Load Helpers
// =============================================================================

/// List segment files in `dir`, sorted oldest → newest.
///
/// Hint files are skipped; any other file that is not a segment name fails
/// the open rather than being guessed at.
fn discover_segments(dir: &Path) -> Result<Vec<SegmentName>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let file_name = file_name
            .to_str()
            .ok_or_else(|| HashKvError::InvalidSegmentName(file_name.to_string_lossy().into_owned()))?;

        if file_name.ends_with(HINT_SUFFIX) {
            continue;
        }
        names.push(SegmentName::parse(file_name)?);
    }

    names.sort();
    Ok(names)
}

/// Replay one segment into `entries`, preferring its hint file
fn load_segment(
    dir: &Path,
    segment: &Segment,
    entries: &mut HashMap<String, IndexRecord>,
) -> Result<()> {
    let name = segment.name();

    match HintFile::new(dir, name).load() {
        Ok(Some(hinted)) => {
            tracing::debug!(segment = %name, keys = hinted.len(), "Loaded segment from hint file");
            // Hint entries are always live keys
            entries.extend(hinted);
            return Ok(());
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(segment = %name, error = %e, "Unable to read hint file, scanning segment");
        }
    }

    let summary = segment.load(entries)?;
    match summary.stop {
        ScanStop::EndOfFile => {
            tracing::debug!(
                segment = %name,
                records = summary.records,
                tombstones = summary.tombstones,
                "Loaded segment from full scan"
            );
        }
        _ => {
            tracing::warn!(
                segment = %name,
                records = summary.records,
                tombstones = summary.tombstones,
                valid_bytes = summary.valid_bytes,
                stop = ?summary.stop,
                "Loaded segment up to a damaged tail"
            );
        }
    }
    Ok(())
}

/// `max(now, last + 1)`, recorded back into `last`
fn next_segment_name(last: &mut u64) -> SegmentName {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let timestamp = now.max(*last + 1);
    *last = timestamp;
    SegmentName::new(timestamp)
}

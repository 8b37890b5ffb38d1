//! In-memory index
//!
//! Maps each live key to the location of its latest value. The index is the
//! only source of truth for liveness: absent means deleted or never written.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::record::IndexRecord;

/// Concurrent key → location map
///
/// ## Concurrency:
/// - `entries`: RwLock (many concurrent `get`s, exclusive mutation)
/// - Compaction re-points entries with a compare-and-swap on the location,
///   so a write that landed after compaction started is never reverted
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<HashMap<String, IndexRecord>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an index rebuilt during load
    pub fn from_map(entries: HashMap<String, IndexRecord>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<IndexRecord> {
        self.entries.read().get(key).copied()
    }

    pub fn insert(&self, key: String, record: IndexRecord) {
        self.entries.write().insert(key, record);
    }

    pub fn remove(&self, key: &str) -> Option<IndexRecord> {
        self.entries.write().remove(key)
    }

    /// Apply many `(key, expected, new)` re-points under one lock.
    ///
    /// Returns how many entries moved.
    pub fn repoint_all<'a, I>(&self, updates: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, IndexRecord, IndexRecord)>,
    {
        let mut entries = self.entries.write();
        let mut moved = 0;
        for (key, expected, new) in updates {
            if let Some(current) = entries.get_mut(key) {
                if *current == expected {
                    *current = new;
                    moved += 1;
                }
            }
        }
        moved
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

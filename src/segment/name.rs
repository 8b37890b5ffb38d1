//! Segment names
//!
//! A segment file is named by its creation timestamp in milliseconds,
//! optionally followed by `-<generation>` when it is a compaction output.
//! Names order by (timestamp, generation); that order is both the replay
//! order and the compaction merge order.

use std::fmt;
use std::str::FromStr;

use crate::error::{HashKvError, Result};

/// Suffix appended to a segment name to form its hint file name
pub const HINT_SUFFIX: &str = ".hint";

/// Parsed segment file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentName {
    // Field order drives the derived ordering
    timestamp: u64,
    generation: u32,
}

impl SegmentName {
    /// Name for a freshly created segment
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            generation: 0,
        }
    }

    /// Name carrying an explicit compaction generation (0 = no suffix)
    pub fn with_generation(timestamp: u64, generation: u32) -> Self {
        Self {
            timestamp,
            generation,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Name of the segment produced by compacting into this (newer) segment
    pub fn next_generation(&self) -> Self {
        Self::with_generation(self.timestamp, self.generation + 1)
    }

    /// File name of this segment's hint file
    pub fn hint_file_name(&self) -> String {
        format!("{}{}", self, HINT_SUFFIX)
    }

    /// Parse a directory entry name.
    ///
    /// Anything that does not round-trip to the same string is rejected, so a
    /// foreign file can never be mistaken for a segment.
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = || HashKvError::InvalidSegmentName(file_name.to_string());

        let (timestamp, generation) = match file_name.split_once('-') {
            Some((ts, gen)) => (ts, Some(gen)),
            None => (file_name, None),
        };

        let timestamp = parse_digits::<u64>(timestamp).ok_or_else(invalid)?;
        let generation = match generation {
            Some(gen) => match parse_digits::<u32>(gen) {
                Some(gen) if gen > 0 => gen,
                _ => return Err(invalid()),
            },
            None => 0,
        };

        let name = Self::with_generation(timestamp, generation);
        if name.to_string() != file_name {
            return Err(invalid());
        }
        Ok(name)
    }
}

/// Parse a non-empty run of ASCII digits
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "{}", self.timestamp)
        } else {
            write!(f, "{}-{}", self.timestamp, self.generation)
        }
    }
}

impl FromStr for SegmentName {
    type Err = HashKvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

//! Configuration for HashKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HashKvError, Result};

/// Main configuration for a HashKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding all segment and hint files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 1718000000000          (sealed segment)
    ///     ├── 1718000000000-1        (compaction output)
    ///     ├── 1718000000000-1.hint   (its hint file)
    ///     └── 1718000004242          (active segment)
    pub data_dir: PathBuf,

    /// Rotate the active segment once a write pushes it past this many bytes
    pub maximum_file_size: u64,

    /// How often appends are fsync'ed
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Period between background compaction runs (None disables the task)
    pub compaction_period: Option<Duration>,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./hashkv_data"),
            maximum_file_size: 1024 * 1000,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            compaction_period: Some(Duration::from_secs(30 * 60)), // 30 minutes
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values can drive a store
    pub fn validate(&self) -> Result<()> {
        if self.maximum_file_size == 0 {
            return Err(HashKvError::Config(
                "maximum_file_size must be greater than 0".to_string(),
            ));
        }

        if self.compaction_period == Some(Duration::ZERO) {
            return Err(HashKvError::Config(
                "compaction_period must be greater than 0".to_string(),
            ));
        }

        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(HashKvError::Config(
                "sync_strategy count must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the rotation threshold (in bytes)
    pub fn maximum_file_size(mut self, size: u64) -> Self {
        self.config.maximum_file_size = size;
        self
    }

    /// Set the segment sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the background compaction period
    pub fn compaction_period(mut self, period: Duration) -> Self {
        self.config.compaction_period = Some(period);
        self
    }

    /// Never schedule background compaction
    pub fn disable_compaction(mut self) -> Self {
        self.config.compaction_period = None;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! Configuration for HashLog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{HashLogError, Result};

/// Default segment size before rotation (10 MiB)
pub const DEFAULT_SEGMENT_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Default number of segments tolerated before compaction runs
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 2;

/// Main configuration for a HashLog instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── segment-1
    ///     ├── segment-2
    ///     └── segment-N      (tail, accepts appends)
    pub data_dir: PathBuf,

    /// Tail size (bytes) at or above which the tail is rotated
    pub segment_size_limit: u64,

    /// Compaction runs after a rotation once the segment count exceeds this.
    /// `None` disables automatic compaction.
    pub compaction_threshold: Option<usize>,

    /// Sync strategy: how often to fsync the tail segment
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Write Path Configuration
    // -------------------------------------------------------------------------
    /// Whether deleting an absent key is an error
    pub delete_mode: DeleteMode,

    /// Max queued write requests before callers block on submission
    pub write_queue_capacity: usize,
}

/// Tail sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },

    /// Leave flushing to the OS; survives process crashes, not power loss
    OsBuffered,
}

/// Behavior of `delete` for keys that are not live anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Always append a tombstone
    #[default]
    Blind,

    /// Fail with `KeyNotFound` unless the key currently has a value
    RequireExisting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./hashlog_data"),
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
            compaction_threshold: Some(DEFAULT_COMPACTION_THRESHOLD),
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            delete_mode: DeleteMode::Blind,
            write_queue_capacity: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.segment_size_limit == 0 {
            return Err(HashLogError::Config(
                "segment_size_limit must be greater than zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(HashLogError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }
        if self.compaction_threshold == Some(0) {
            return Err(HashLogError::Config(
                "compaction_threshold must be at least 1 (use None to disable)".to_string(),
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
    pub fn segment_size_limit(mut self, size: u64) -> Self {
        self.config.segment_size_limit = size;
        self
    }

    /// Set the compaction threshold (segment count), `None` to disable
    pub fn compaction_threshold(mut self, threshold: Option<usize>) -> Self {
        self.config.compaction_threshold = threshold;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the delete mode
    pub fn delete_mode(mut self, mode: DeleteMode) -> Self {
        self.config.delete_mode = mode;
        self
    }

    /// Set the write queue capacity
    pub fn write_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.write_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! Store Module
//!
//! The ordered list of segments (oldest → newest) and the policies that
//! grow and shrink it.
//!
//! ## Responsibilities
//! - Bootstrap a data directory, or recover every segment found in it
//! - Resolve reads newest → oldest
//! - Append to the tail and rotate it once it reaches the size limit
//! - Merge all immutable segments into one when there are too many
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── segment-1        (merged, immutable)
//!   ├── segment-4        (immutable)
//!   └── segment-5        (tail)
//! ```

mod compaction;
pub mod layout;
mod manager;

pub use compaction::CompactionReport;
pub use manager::SegmentStore;

/// Point-in-time view of one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub id: u64,
    pub size: u64,
    pub keys: usize,
    pub is_tail: bool,
}

/// Point-in-time view of the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Oldest first
    pub segments: Vec<SegmentStats>,
}

impl StoreStats {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_size(&self) -> u64 {
        self.segments.iter().map(|s| s.size).sum()
    }

    pub fn tail(&self) -> Option<&SegmentStats> {
        self.segments.last()
    }
}

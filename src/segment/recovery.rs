//! Segment Recovery
//!
//! Rebuilds a segment's index by replaying its file from the start.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

use super::file::Segment;
use super::scanner::SegmentScanner;

/// Result of replaying one segment file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number of complete records replayed
    pub records: u64,

    /// Distinct keys left in the index
    pub keys: usize,

    /// Length of the well-formed prefix of the file
    pub valid_len: u64,

    /// Bytes of a torn final record that were ignored
    pub truncated_bytes: u64,
}

impl RecoveryReport {
    /// Whether a torn final record was discarded
    pub fn was_truncated(&self) -> bool {
        self.truncated_bytes > 0
    }
}

impl Segment {
    /// Load an existing segment file, rebuilding its index
    ///
    /// Later records for a key overwrite earlier ones. A torn final record is
    /// left out of the index (and out of `size()`); a malformed record that
    /// still fits in the file fails with `CorruptFrame`. The returned segment
    /// is sealed; call `resume_appends` to make it the tail.
    pub fn recover(path: &Path, id: u64) -> Result<(Self, RecoveryReport)> {
        let mut scanner = SegmentScanner::open(path, id)?;
        let mut index = HashMap::new();
        let mut records = 0u64;

        for item in scanner.by_ref() {
            let item = item?;
            index.insert(item.entry.key, item.offset);
            records += 1;
        }

        let report = RecoveryReport {
            records,
            keys: index.len(),
            valid_len: scanner.position(),
            truncated_bytes: scanner.truncated_bytes(),
        };

        if report.was_truncated() {
            tracing::warn!(
                segment = id,
                valid_len = report.valid_len,
                discarded = report.truncated_bytes,
                "Discarding torn final record"
            );
        }
        tracing::debug!(
            segment = id,
            records = report.records,
            keys = report.keys,
            "Recovered segment"
        );

        let segment = Segment::from_parts(path.to_path_buf(), id, index, report.valid_len)?;
        Ok((segment, report))
    }
}

//! Compaction
//!
//! Merges every immutable segment into one, keeping only the newest record
//! per key and dropping keys whose newest record is a tombstone.
//!
//! The merged file is written under a temporary name, synced, then renamed
//! over the oldest input's file. The inputs stay authoritative until that
//! rename succeeds; only afterwards are the newer input files deleted, oldest
//! first. Whatever newer inputs survive a crash or a failed delete are the
//! newest of the merged range, so they still shadow the merged segment
//! correctly on reopen.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{HashLogError, Result};
use crate::segment::{Entry, Segment};

use super::layout::{compacting_path, segment_path};
use super::manager::SegmentStore;

/// Outcome of one compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    /// Ids of the segments that were merged, oldest first
    pub merged_ids: Vec<u64>,

    /// Id of the segment that replaced them
    pub output_id: u64,

    /// Keys carried into the merged segment
    pub live_keys: usize,

    /// Keys dropped because their newest record was a tombstone
    pub dropped_keys: usize,

    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl SegmentStore {
    /// Merge all segments but the tail (called with write lock held)
    ///
    /// Returns `None` when there is nothing but the tail.
    pub(super) fn compact_locked(&self) -> Result<Option<CompactionReport>> {
        let snapshot = self.segments.read().clone();
        let Some((tail, inputs)) = snapshot.split_last() else {
            return Ok(None);
        };
        let Some(oldest_input) = inputs.first() else {
            return Ok(None);
        };

        let dir = self.config.data_dir.clone();
        let output_id = oldest_input.id();
        let temp_path = compacting_path(&dir, output_id);
        let final_path = segment_path(&dir, output_id);

        // Newest input first, so the first record seen for a key wins
        let mut winners: HashMap<Vec<u8>, (usize, u64)> = HashMap::new();
        for (pos, segment) in inputs.iter().enumerate().rev() {
            for (key, offset) in segment.index_snapshot() {
                winners.entry(key).or_insert((pos, offset));
            }
        }
        let mut winners: Vec<_> = winners.into_iter().collect();
        winners.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let merged = match write_merged(&temp_path, &final_path, inputs, &winners) {
            Ok(merged) => merged,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path) {
                    tracing::warn!(
                        path = %temp_path.display(),
                        "Failed to remove partial compaction output: {}",
                        cleanup
                    );
                }
                tracing::error!(output = output_id, "Compaction failed: {}", e);
                return Err(e);
            }
        };

        let bytes_after = merged.size;
        let live_keys = merged.index.len();
        let segment = Segment::from_parts(final_path, output_id, merged.index, merged.size)?;

        // Oldest first, so whatever survives is a suffix of the merged range
        let mut retained = Vec::new();
        for (pos, input) in inputs.iter().enumerate().skip(1) {
            if let Err(e) = fs::remove_file(input.path()) {
                tracing::error!(
                    segment = input.id(),
                    path = %input.path().display(),
                    "Failed to delete superseded segment, keeping it and newer inputs: {}",
                    e
                );
                retained = inputs[pos..].to_vec();
                break;
            }
        }

        // Install: merged segment, any inputs that could not be deleted, tail
        let mut installed = Vec::with_capacity(retained.len() + 2);
        installed.push(Arc::new(segment));
        installed.extend(retained);
        installed.push(Arc::clone(tail));
        *self.segments.write() = installed;

        let report = CompactionReport {
            merged_ids: inputs.iter().map(|s| s.id()).collect(),
            output_id,
            live_keys,
            dropped_keys: merged.dropped_keys,
            bytes_before: inputs.iter().map(|s| s.size()).sum(),
            bytes_after,
        };

        tracing::info!(
            merged = ?report.merged_ids,
            output = output_id,
            live_keys = report.live_keys,
            dropped_keys = report.dropped_keys,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "Compacted segments"
        );
        Ok(Some(report))
    }
}

/// Index and size of a merged segment that is installed on disk
struct MergedOutput {
    index: HashMap<Vec<u8>, u64>,
    size: u64,
    dropped_keys: usize,
}

/// Copy the winning records into `temp_path`, then rename it to `final_path`
fn write_merged(
    temp_path: &Path,
    final_path: &Path,
    inputs: &[Arc<Segment>],
    winners: &[(Vec<u8>, (usize, u64))],
) -> Result<MergedOutput> {
    let mut builder = MergedSegmentBuilder::new(temp_path)?;
    let mut dropped_keys = 0;

    for (key, (pos, offset)) in winners {
        let entry = inputs[*pos].read_at(*offset)?;
        if entry.key != *key {
            return Err(HashLogError::InvalidLayout(format!(
                "index of segment {} points at a record for another key",
                inputs[*pos].id()
            )));
        }
        if entry.is_tombstone() {
            dropped_keys += 1;
            continue;
        }
        builder.add(&entry)?;
    }

    let (index, size) = builder.finish(final_path)?;
    Ok(MergedOutput {
        index,
        size,
        dropped_keys,
    })
}

/// Writes a merged segment to a temporary file
struct MergedSegmentBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    index: HashMap<Vec<u8>, u64>,
    offset: u64,
}

impl MergedSegmentBuilder {
    fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            index: HashMap::new(),
            offset: 0,
        })
    }

    fn add(&mut self, entry: &Entry) -> Result<()> {
        let frame = entry.encode();
        self.writer.write_all(&frame)?;
        self.index.insert(entry.key.clone(), self.offset);
        self.offset += frame.len() as u64;
        Ok(())
    }

    /// Flush, fsync, and atomically move the file into place
    fn finish(self, final_path: &Path) -> Result<(HashMap<Vec<u8>, u64>, u64)> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| HashLogError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.path, final_path)?;
        if let Some(dir) = final_path.parent() {
            sync_dir(dir)?;
        }

        Ok((self.index, self.offset))
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

//! Segment Store
//!
//! Owns the ordered segment list and the tail, and coordinates reads,
//! appends, rotation and compaction over it.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, DeleteMode};
use crate::error::{HashLogError, Result};
use crate::segment::{EntryKind, Segment};

use super::compaction::CompactionReport;
use super::layout::{self, segment_path};
use super::{SegmentStats, StoreStats};

/// Manages the segment list
///
/// ## Concurrency:
/// - `segments`: RwLock over the list, oldest → newest; the last element is
///   the tail. Readers clone the list (cheap `Arc` copies) and drop the lock
///   before any lookup or file I/O.
/// - `write_lock`: serializes every mutation (append, rotation, compaction,
///   close). The engine funnels all writes through one thread, so this lock
///   is uncontended there; it keeps direct users of the store honest too.
pub struct SegmentStore {
    pub(super) config: Config,
    pub(super) segments: RwLock<Vec<Arc<Segment>>>,
    pub(super) write_lock: Mutex<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SegmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SegmentStore {
    /// Open or create a store in `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Validate the layout (unknown files are fatal)
    /// 3. Recover every segment in id order
    /// 4. Reopen the newest segment as the tail, or create `segment-1`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let dir = config.data_dir.clone();
        fs::create_dir_all(&dir)?;

        let listing = layout::scan_dir(&dir)?;
        for stale in &listing.stale_temp_files {
            tracing::warn!(
                path = %stale.display(),
                "Removing output of an interrupted compaction"
            );
            fs::remove_file(stale)?;
        }

        let mut segments = Vec::with_capacity(listing.segment_ids.len().max(1));
        if listing.segment_ids.is_empty() {
            let tail = Segment::create(&segment_path(&dir, 1), 1, config.sync_strategy)?;
            segments.push(Arc::new(tail));
            tracing::info!(dir = %dir.display(), "Initialized empty store");
        } else {
            let mut records = 0;
            for &id in &listing.segment_ids {
                let (segment, report) = Segment::recover(&segment_path(&dir, id), id)?;
                records += report.records;
                segments.push(Arc::new(segment));
            }
            if let Some(tail) = segments.last() {
                tail.resume_appends(config.sync_strategy)?;
            }
            tracing::info!(
                dir = %dir.display(),
                segments = segments.len(),
                records,
                "Recovered store"
            );
        }

        Ok(Self {
            config,
            segments: RwLock::new(segments),
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Get the live value for `key`
    ///
    /// Segments are searched newest → oldest; the first one that indexes the
    /// key decides. A tombstone there, or no hit at all, is `KeyNotFound`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let segments = self.snapshot()?;

        for segment in segments.iter().rev() {
            let Some(offset) = segment.lookup(key) else {
                continue;
            };
            let entry = segment.read_at(offset)?;
            return match entry.kind {
                EntryKind::Value => Ok(entry.value),
                EntryKind::Tombstone => Err(HashLogError::KeyNotFound),
            };
        }

        Err(HashLogError::KeyNotFound)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append a value for `key` to the tail
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.append_locked(key, value, EntryKind::Value)
    }

    /// Append a tombstone for `key` to the tail
    ///
    /// With `DeleteMode::RequireExisting`, fails with `KeyNotFound` unless
    /// the key currently has a value.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        if self.config.delete_mode == DeleteMode::RequireExisting {
            self.get(key)?;
        }
        self.append_locked(key, &[], EntryKind::Tombstone)
    }

    /// Merge all immutable segments now, regardless of the threshold
    pub fn compact(&self) -> Result<Option<CompactionReport>> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;
        self.compact_locked()
    }

    /// Force the tail's pending appends to disk
    pub fn sync(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.tail()?.sync()
    }

    /// Close every segment; idempotent
    pub fn close(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let segments = self.segments.read().clone();
        let mut first_error = None;
        for segment in &segments {
            if let Err(e) = segment.close() {
                tracing::error!(segment = segment.id(), "Failed to close segment: {}", e);
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(segments = segments.len(), "Store closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Internal append (called with write lock held)
    ///
    /// Once the record is on disk the write has happened, so a failed
    /// rotation or compaction afterwards is logged rather than returned. The
    /// tail stays over the limit and the next append rotates again;
    /// compaction is retried after the next rotation.
    fn append_locked(&self, key: &[u8], value: &[u8], kind: EntryKind) -> Result<()> {
        let tail = self.tail()?;
        tail.append(key, value, kind)?;

        if tail.size() >= self.config.segment_size_limit {
            if let Err(e) = self.rotate_locked() {
                tracing::error!(
                    tail = tail.id(),
                    "Rotation failed, retrying on next write: {}",
                    e
                );
                return Ok(());
            }

            if let Some(threshold) = self.config.compaction_threshold {
                if self.segment_count() > threshold {
                    if let Err(e) = self.compact_locked() {
                        tracing::error!("Compaction failed, retrying after next rotation: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Start a new tail with the next sequence number (called with write lock held)
    ///
    /// Nothing already on disk is rewritten; the old tail is only sealed.
    fn rotate_locked(&self) -> Result<()> {
        let old_tail = self.tail()?;
        let next_id = old_tail.id() + 1;

        let new_tail = Segment::create(
            &segment_path(&self.config.data_dir, next_id),
            next_id,
            self.config.sync_strategy,
        )?;
        self.segments.write().push(Arc::new(new_tail));
        old_tail.seal()?;

        tracing::info!(
            sealed = old_tail.id(),
            sealed_size = old_tail.size(),
            tail = next_id,
            "Rotated segment"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of segments, tail included
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Segment ids, oldest first
    pub fn segment_ids(&self) -> Vec<u64> {
        self.segments.read().iter().map(|s| s.id()).collect()
    }

    /// Per-segment sizes and key counts
    pub fn stats(&self) -> StoreStats {
        let segments = self.segments.read().clone();
        let last = segments.len().saturating_sub(1);

        StoreStats {
            segments: segments
                .iter()
                .enumerate()
                .map(|(pos, s)| SegmentStats {
                    id: s.id(),
                    size: s.size(),
                    keys: s.key_count(),
                    is_tail: pos == last,
                })
                .collect(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    pub(super) fn tail(&self) -> Result<Arc<Segment>> {
        self.ensure_open()?;
        self.segments
            .read()
            .last()
            .cloned()
            .ok_or_else(|| HashLogError::InvalidLayout("store has no tail segment".to_string()))
    }

    fn snapshot(&self) -> Result<Vec<Arc<Segment>>> {
        self.ensure_open()?;
        Ok(self.segments.read().clone())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(HashLogError::Closed);
        }
        Ok(())
    }
}

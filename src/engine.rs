//! Engine Module
//!
//! The public face of the store: what collaborators (an HTTP handler, the
//! CLI) hold and call.
//!
//! ## Responsibilities
//! - Open the store and start the write serializer
//! - Route writes through the serializer, reads straight to the store
//! - Drain pending writes and close every segment on shutdown

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{HashLogError, Result};
use crate::store::{CompactionReport, SegmentStore, StoreStats};
use crate::writer::{WriteOp, WriteOutcome, WriteSerializer};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (put/delete/compact/sync): enqueued to one writer thread and
///   applied in arrival order. The caller blocks until its own request,
///   including any rotation or compaction it triggered, has completed.
/// - **Reads** (get): run on the caller's thread. They take a snapshot of the
///   segment list, lock each segment's index only for the map lookup, and
///   read the record without holding any lock the writer needs.
///
/// `Engine` is `Send + Sync`; share it with `Arc<Engine>`.
pub struct Engine {
    store: Arc<SegmentStore>,
    writer: WriteSerializer,
    closed: AtomicBool,
}

impl Engine {
    /// Open or create an engine with the given config
    pub fn open(config: Config) -> Result<Self> {
        let capacity = config.write_queue_capacity;
        let store = Arc::new(SegmentStore::open(config)?);
        let writer = WriteSerializer::spawn(Arc::clone(&store), capacity)?;

        tracing::info!(
            dir = %store.data_dir().display(),
            segments = store.segment_count(),
            "Engine opened"
        );

        Ok(Self {
            store,
            writer,
            closed: AtomicBool::new(false),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Fails with `KeyNotFound` if the key was never written or was deleted.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.store.get(key.as_ref())
    }

    /// Put a key-value pair
    ///
    /// `Ok` means the record is appended and readable. Rotation and
    /// compaction triggered by it never turn a stored write into an error;
    /// their failures are logged and retried by later writes.
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_open()?;
        self.writer.submit(WriteOp::Put {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        })?;
        Ok(())
    }

    /// Delete a key
    ///
    /// Whether deleting an absent key is an error depends on
    /// `Config::delete_mode`.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_open()?;
        self.writer.submit(WriteOp::Delete {
            key: key.as_ref().to_vec(),
        })?;
        Ok(())
    }

    /// Merge all immutable segments now
    pub fn compact(&self) -> Result<Option<CompactionReport>> {
        self.ensure_open()?;
        match self.writer.submit(WriteOp::Compact)? {
            WriteOutcome::Compacted(report) => Ok(report),
            WriteOutcome::Applied => Ok(None),
        }
    }

    /// Force pending tail appends to disk
    pub fn sync(&self) -> Result<()> {
        self.ensure_open()?;
        self.writer.submit(WriteOp::Sync)?;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Writes already queued are applied before the segments are closed.
    /// Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let drained = self.writer.shutdown();
        let closed = self.store.close();
        drained?;
        closed?;

        tracing::info!(dir = %self.store.data_dir().display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        self.store.data_dir()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        self.store.config()
    }

    /// Get the number of segments, tail included
    pub fn segment_count(&self) -> usize {
        self.store.segment_count()
    }

    /// Get the segment ids, oldest first
    pub fn segment_ids(&self) -> Vec<u64> {
        self.store.segment_ids()
    }

    /// Get per-segment sizes and key counts
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(HashLogError::Closed);
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close engine on drop: {}", e);
        }
    }
}

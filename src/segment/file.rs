//! Segment file
//!
//! An append-only log file and its key → offset hash index.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::SyncStrategy;
use crate::error::{FrameError, HashLogError, Result};

use super::entry::{checked_frame_len, decode, encode, Entry, EntryKind};
use super::{HEADER_SIZE, LEN_PREFIX_SIZE};

/// Append handle, present only while the segment is the tail
struct Appender {
    file: File,
    sync_strategy: SyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
}

impl Appender {
    fn after_append(&mut self) -> io::Result<()> {
        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
            SyncStrategy::OsBuffered => false,
        };
        if due {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }
}

/// One segment of the log
///
/// ## Concurrency:
/// - `index`: Mutex held only for the map lookup/mutation, never across I/O
/// - `reader`: shared handle used with positional reads, so readers never
///   contend on a file cursor; the RwLock only guards against `close()`
/// - `appender`: touched by the single writer; `None` once sealed
/// - `size`: published after the bytes hit the file and before the index
///   points at them
pub struct Segment {
    id: u64,
    path: PathBuf,
    reader: RwLock<Option<File>>,
    index: Mutex<HashMap<Vec<u8>, u64>>,
    appender: Mutex<Option<Appender>>,
    size: AtomicU64,
}

impl Segment {
    /// Create a new, empty tail segment at `path`
    ///
    /// Fails if the file already exists.
    pub fn create(path: &Path, id: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(path)?;
        let reader = File::open(path)?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            reader: RwLock::new(Some(reader)),
            index: Mutex::new(HashMap::new()),
            appender: Mutex::new(Some(Appender {
                file,
                sync_strategy,
                unsynced: 0,
            })),
            size: AtomicU64::new(0),
        })
    }

    /// Build a sealed segment over an existing file whose index is known
    pub(crate) fn from_parts(
        path: PathBuf,
        id: u64,
        index: HashMap<Vec<u8>, u64>,
        size: u64,
    ) -> Result<Self> {
        let reader = File::open(&path)?;

        Ok(Self {
            id,
            path,
            reader: RwLock::new(Some(reader)),
            index: Mutex::new(index),
            appender: Mutex::new(None),
            size: AtomicU64::new(size),
        })
    }

    /// Reopen a recovered segment as the tail
    ///
    /// Bytes past the recovered length (a torn final write) are cut off first
    /// so new frames follow the last complete one.
    pub fn resume_appends(&self, sync_strategy: SyncStrategy) -> Result<()> {
        let mut appender = self.appender.lock();
        if appender.is_some() {
            return Ok(());
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let valid_len = self.size();
        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            tracing::warn!(
                segment = self.id,
                discarded = on_disk - valid_len,
                "Truncating torn tail before resuming appends"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        *appender = Some(Appender {
            file,
            sync_strategy,
            unsynced: 0,
        });
        Ok(())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append a record at end-of-file and index it
    ///
    /// Returns `(offset, bytes_written)`. The index only changes after the
    /// write succeeded; a failed write is rolled back to the previous length.
    /// A record too large for the length prefix is rejected before any I/O.
    pub fn append(&self, key: &[u8], value: &[u8], kind: EntryKind) -> Result<(u64, u64)> {
        let value_len = match kind {
            EntryKind::Value => value.len(),
            EntryKind::Tombstone => 0,
        };
        if checked_frame_len(key.len(), value_len).is_none() {
            return Err(HashLogError::EntryTooLarge {
                key_len: key.len(),
                value_len,
            });
        }

        let mut guard = self.appender.lock();
        let appender = guard.as_mut().ok_or(HashLogError::SegmentSealed(self.id))?;

        let offset = self.size.load(Ordering::Acquire);
        let frame = encode(key, value, kind);

        let written = appender
            .file
            .write_all(&frame)
            .and_then(|_| appender.after_append());
        if let Err(e) = written {
            if let Err(rollback) = appender.file.set_len(offset) {
                tracing::error!(
                    segment = self.id,
                    offset,
                    "Failed to roll back partial append: {}",
                    rollback
                );
            }
            return Err(e.into());
        }

        let len = frame.len() as u64;
        self.size.store(offset + len, Ordering::Release);
        self.index.lock().insert(key.to_vec(), offset);

        tracing::trace!(segment = self.id, offset, len, ?kind, "Appended record");
        Ok((offset, len))
    }

    /// Force buffered appends to disk
    pub fn sync(&self) -> Result<()> {
        if let Some(appender) = self.appender.lock().as_mut() {
            appender.file.sync_data()?;
            appender.unsynced = 0;
        }
        Ok(())
    }

    /// Finalize: no further appends will target this segment
    pub fn seal(&self) -> Result<()> {
        if let Some(appender) = self.appender.lock().take() {
            appender.file.sync_all()?;
        }
        Ok(())
    }

    /// Release both file handles; later reads fail with `Closed`
    pub fn close(&self) -> Result<()> {
        self.seal()?;
        self.reader.write().take();
        Ok(())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Offset of the latest record for `key` in this segment
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        self.index.lock().get(key).copied()
    }

    /// Decode the frame starting at `offset`
    pub fn read_at(&self, offset: u64) -> Result<Entry> {
        let guard = self.reader.read();
        let file = guard.as_ref().ok_or(HashLogError::Closed)?;

        let available = self.size().saturating_sub(offset);
        let mut prefix = [0u8; LEN_PREFIX_SIZE];
        if available < LEN_PREFIX_SIZE as u64 {
            return Err(self.corrupt(offset, FrameError::TooShort(available as usize)));
        }
        read_exact_at(file, &mut prefix, offset)?;

        let declared = u32::from_le_bytes(prefix);
        if (declared as u64) < HEADER_SIZE as u64 || declared as u64 > available {
            return Err(self.corrupt(
                offset,
                FrameError::LengthMismatch {
                    declared,
                    actual: available as usize,
                },
            ));
        }

        let mut frame = vec![0u8; declared as usize];
        read_exact_at(file, &mut frame, offset)?;

        decode(&frame).map_err(|source| self.corrupt(offset, source))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length (= write offset)
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of distinct keys indexed (tombstones included)
    pub fn key_count(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_sealed(&self) -> bool {
        self.appender.lock().is_none()
    }

    /// Copy of the index (for compaction)
    pub fn index_snapshot(&self) -> HashMap<Vec<u8>, u64> {
        self.index.lock().clone()
    }

    fn corrupt(&self, offset: u64, source: FrameError) -> HashLogError {
        HashLogError::CorruptFrame {
            segment: self.id,
            offset,
            source,
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("size", &self.size())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

//! Error types for HashLog
//!
//! Provides a unified error type for all engine operations, plus the
//! frame-level error produced by the entry codec.

use thiserror::Error;

/// Result type alias using HashLogError
pub type Result<T> = std::result::Result<T, HashLogError>;

/// Unified error type for HashLog operations
#[derive(Debug, Error)]
pub enum HashLogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt frame in segment {segment} at offset {offset}: {source}")]
    CorruptFrame {
        segment: u64,
        offset: u64,
        #[source]
        source: FrameError,
    },

    #[error("Segment {0} is sealed and no longer accepts appends")]
    SegmentSealed(u64),

    #[error("Entry too large: {key_len}-byte key and {value_len}-byte value exceed the 4 GiB frame limit")]
    EntryTooLarge { key_len: usize, value_len: usize },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Invalid data directory layout: {0}")]
    InvalidLayout(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Engine is closed")]
    Closed,

    #[error("Write serializer unavailable: {0}")]
    WriterUnavailable(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HashLogError {
    /// True for the normal negative lookup result (absent or tombstoned key)
    pub fn is_not_found(&self) -> bool {
        matches!(self, HashLogError::KeyNotFound)
    }

    /// True when a record failed to decode
    pub fn is_corrupt_frame(&self) -> bool {
        matches!(self, HashLogError::CorruptFrame { .. })
    }
}

/// Reasons a single frame fails to decode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("declared length {declared} but {actual} bytes available")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("key/value lengths ({key_len} + {value_len}) do not fill declared length {declared}")]
    FieldOverrun {
        declared: u32,
        key_len: u32,
        value_len: u32,
    },

    #[error("unknown entry kind tag {0:#04x}")]
    UnknownKind(u8),

    #[error("tombstone carries a {0}-byte value")]
    TombstoneWithValue(u32),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

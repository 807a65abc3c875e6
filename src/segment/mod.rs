//! Segment Module
//!
//! One append-only log file plus its in-memory hash index.
//!
//! ## Responsibilities
//! - Encode/decode individual log records (frames)
//! - Append records to the tail and index them by key
//! - Point reads at a recorded offset
//! - Rebuild the index by replaying the file on startup
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬─────────┬──────────┬────────────┬────────────┬─────┬───────┐
//! │ Len (4)  │ CRC (4) │ Kind (1) │ KeyLen (4) │ ValLen (4) │ Key │ Value │
//! └──────────┴─────────┴──────────┴────────────┴────────────┴─────┴───────┘
//! ```
//! - All integers little-endian
//! - `Len` counts the whole frame, itself included
//! - `CRC` covers every byte after the CRC field
//! - `Kind`: 0x00 = value, 0x01 = tombstone (empty value)

mod entry;
mod file;
mod recovery;
mod scanner;

pub use entry::{checked_frame_len, decode, encode, encoded_len, Entry, EntryKind};
pub use file::Segment;
pub use recovery::RecoveryReport;
pub use scanner::{ScanItem, SegmentScanner};

// =============================================================================
// Shared Constants (used by entry, file, scanner)
// =============================================================================

/// Size of the length prefix
pub const LEN_PREFIX_SIZE: usize = 4;

/// Header size: Len (4) + CRC (4) + Kind (1) + KeyLen (4) + ValLen (4) = 17 bytes
pub const HEADER_SIZE: usize = 17;

//! Segment Scanner
//!
//! Sequential iteration over every frame in a segment file, from offset 0.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{FrameError, HashLogError, Result};

use super::entry::{decode, Entry};
use super::{HEADER_SIZE, LEN_PREFIX_SIZE};

/// One decoded frame and where it sits in the file
#[derive(Debug, Clone)]
pub struct ScanItem {
    /// Byte offset of the frame's length prefix
    pub offset: u64,
    /// Total frame length
    pub len: u64,
    pub entry: Entry,
}

/// Iterator over the frames of a segment file
///
/// Iteration ends cleanly at end-of-file. A torn final frame (partial length
/// prefix, or a declared length running past end-of-file whose header agrees
/// with that length) also ends iteration and is reported through
/// `truncated_bytes()`. Anything else that fails to decode, including a length
/// prefix its own header contradicts, yields a `CorruptFrame` error and stops
/// the iterator.
pub struct SegmentScanner {
    reader: BufReader<File>,
    segment_id: u64,
    file_len: u64,
    /// Offset of the next frame (= length of the valid prefix so far)
    position: u64,
    truncated_bytes: u64,
    done: bool,
}

impl SegmentScanner {
    pub fn open(path: &Path, segment_id: u64) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            segment_id,
            file_len,
            position: 0,
            truncated_bytes: 0,
            done: false,
        })
    }

    /// Length of the well-formed prefix scanned so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes of a torn final frame discarded at end-of-file
    pub fn truncated_bytes(&self) -> u64 {
        self.truncated_bytes
    }

    fn read_next(&mut self) -> Result<Option<ScanItem>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < LEN_PREFIX_SIZE as u64 {
            self.truncated_bytes = remaining;
            return Ok(None);
        }

        let mut prefix = [0u8; LEN_PREFIX_SIZE];
        self.reader.read_exact(&mut prefix)?;
        let declared = u32::from_le_bytes(prefix) as u64;

        if declared < HEADER_SIZE as u64 {
            return Err(self.corrupt(FrameError::TooShort(declared as usize)));
        }
        if declared > remaining {
            // A torn write still carries a header that agrees with its length
            if remaining >= HEADER_SIZE as u64 {
                let mut rest = [0u8; HEADER_SIZE - LEN_PREFIX_SIZE];
                self.reader.read_exact(&mut rest)?;
                let key_len = u32::from_le_bytes([rest[5], rest[6], rest[7], rest[8]]);
                let value_len = u32::from_le_bytes([rest[9], rest[10], rest[11], rest[12]]);
                if HEADER_SIZE as u64 + key_len as u64 + value_len as u64 != declared {
                    return Err(self.corrupt(FrameError::FieldOverrun {
                        declared: declared as u32,
                        key_len,
                        value_len,
                    }));
                }
            }
            self.truncated_bytes = remaining;
            return Ok(None);
        }

        let mut frame = vec![0u8; declared as usize];
        frame[..LEN_PREFIX_SIZE].copy_from_slice(&prefix);
        self.reader.read_exact(&mut frame[LEN_PREFIX_SIZE..])?;

        let entry = decode(&frame).map_err(|source| self.corrupt(source))?;
        let item = ScanItem {
            offset: self.position,
            len: declared,
            entry,
        };
        self.position += declared;

        Ok(Some(item))
    }

    fn corrupt(&self, source: FrameError) -> HashLogError {
        HashLogError::CorruptFrame {
            segment: self.segment_id,
            offset: self.position,
            source,
        }
    }
}

impl Iterator for SegmentScanner {
    type Item = Result<ScanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

//! Entry codec
//!
//! Pure encode/decode of a single self-delimiting log frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

use super::HEADER_SIZE;

const KIND_VALUE: u8 = 0x00;
const KIND_TOMBSTONE: u8 = 0x01;

/// Record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A live value
    Value,

    /// A deletion marker
    Tombstone,
}

impl EntryKind {
    fn tag(self) -> u8 {
        match self {
            EntryKind::Value => KIND_VALUE,
            EntryKind::Tombstone => KIND_TOMBSTONE,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, FrameError> {
        match tag {
            KIND_VALUE => Ok(EntryKind::Value),
            KIND_TOMBSTONE => Ok(EntryKind::Tombstone),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// A decoded log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub kind: EntryKind,
}

impl Entry {
    pub fn value(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: EntryKind::Value,
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            kind: EntryKind::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.kind == EntryKind::Tombstone
    }

    /// Encode this entry into a frame
    pub fn encode(&self) -> Bytes {
        encode(&self.key, &self.value, self.kind)
    }
}

/// Size in bytes of the frame `encode` would produce
pub fn encoded_len(key: &[u8], value: &[u8]) -> usize {
    HEADER_SIZE + key.len() + value.len()
}

/// Frame size for the given field lengths, or `None` when the 32-bit length
/// prefix cannot describe it
pub fn checked_frame_len(key_len: usize, value_len: usize) -> Option<u32> {
    let total = (HEADER_SIZE as u64)
        .checked_add(key_len as u64)?
        .checked_add(value_len as u64)?;
    u32::try_from(total).ok()
}

/// Encode a record into a length-prefixed frame
///
/// Tombstones are always written with an empty value, whatever `value` holds.
/// The frame must fit the length prefix; see `checked_frame_len`.
pub fn encode(key: &[u8], value: &[u8], kind: EntryKind) -> Bytes {
    let value: &[u8] = match kind {
        EntryKind::Value => value,
        EntryKind::Tombstone => &[],
    };
    let total = encoded_len(key, value);
    debug_assert!(checked_frame_len(key.len(), value.len()).is_some());

    let mut body = BytesMut::with_capacity(total);
    body.put_u32_le(total as u32);
    body.put_u32_le(0); // CRC placeholder, patched below
    body.put_u8(kind.tag());
    body.put_u32_le(key.len() as u32);
    body.put_u32_le(value.len() as u32);
    body.put_slice(key);
    body.put_slice(value);

    let crc = crc32fast::hash(&body[8..]);
    body[4..8].copy_from_slice(&crc.to_le_bytes());

    body.freeze()
}

/// Decode exactly one frame; `frame` must hold the whole frame and nothing else
pub fn decode(frame: &[u8]) -> Result<Entry, FrameError> {
    if frame.len() < HEADER_SIZE {
        return Err(FrameError::TooShort(frame.len()));
    }

    let mut buf = frame;
    let declared = buf.get_u32_le();
    if declared as usize != frame.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }

    let stored_crc = buf.get_u32_le();
    let tag = buf.get_u8();
    let key_len = buf.get_u32_le();
    let value_len = buf.get_u32_le();

    let body_len = key_len as u64 + value_len as u64;
    if HEADER_SIZE as u64 + body_len != declared as u64 {
        return Err(FrameError::FieldOverrun {
            declared,
            key_len,
            value_len,
        });
    }

    let computed_crc = crc32fast::hash(&frame[8..]);
    if computed_crc != stored_crc {
        return Err(FrameError::ChecksumMismatch {
            stored: stored_crc,
            computed: computed_crc,
        });
    }

    let kind = EntryKind::from_tag(tag)?;
    if kind == EntryKind::Tombstone && value_len != 0 {
        return Err(FrameError::TombstoneWithValue(value_len));
    }

    let key = buf[..key_len as usize].to_vec();
    buf.advance(key_len as usize);
    let value = buf[..value_len as usize].to_vec();

    Ok(Entry { key, value, kind })
}

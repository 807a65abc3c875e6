//! Data directory layout
//!
//! The set of `segment-<n>` files is the entire persisted state; there is no
//! manifest. Anything else in the directory is a layout error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HashLogError, Result};

/// Filename prefix shared by all segment files
pub const SEGMENT_PREFIX: &str = "segment-";

/// Suffix of a merged segment that has not been installed yet
pub const COMPACTING_SUFFIX: &str = ".compacting";

/// What `scan_dir` found in a data directory
#[derive(Debug, Default)]
pub struct DirListing {
    /// Segment ids, ascending
    pub segment_ids: Vec<u64>,

    /// Leftover compaction outputs that were never installed
    pub stale_temp_files: Vec<PathBuf>,
}

/// Path of the segment file with the given id
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}", SEGMENT_PREFIX, id))
}

/// Path of the temporary file a compaction into `id` writes to
pub fn compacting_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}{}", SEGMENT_PREFIX, id, COMPACTING_SUFFIX))
}

/// Parse a segment id from a filename
/// "segment-42" → Some(42); "segment-042", "segment-0", "segment-+1" → None
pub fn parse_segment_id(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SEGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// List and validate a data directory
pub fn scan_dir(dir: &Path) -> Result<DirListing> {
    let mut listing = DirListing::default();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            HashLogError::InvalidLayout(format!(
                "non UTF-8 filename {:?} in {}",
                file_name,
                dir.display()
            ))
        })?;

        if !entry.file_type()?.is_file() {
            return Err(HashLogError::InvalidLayout(format!(
                "unexpected non-file entry '{}' in {}",
                name,
                dir.display()
            )));
        }

        if let Some(id) = parse_segment_id(name) {
            listing.segment_ids.push(id);
            continue;
        }

        let is_temp = name
            .strip_suffix(COMPACTING_SUFFIX)
            .and_then(parse_segment_id)
            .is_some();
        if is_temp {
            listing.stale_temp_files.push(entry.path());
            continue;
        }

        return Err(HashLogError::InvalidLayout(format!(
            "unexpected file '{}' in {}",
            name,
            dir.display()
        )));
    }

    listing.segment_ids.sort_unstable();
    Ok(listing)
}

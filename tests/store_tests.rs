//! Tests for SegmentStore
//!
//! These tests verify:
//! - Directory bootstrap and layout validation
//! - Newest → oldest read resolution across segments
//! - Rotation on the size threshold
//! - Delete modes
//! - Persistence (reopen and recover every segment)

use std::fs;
use std::path::Path;

use hashlog::config::{Config, DeleteMode, SyncStrategy};
use hashlog::store::layout::{parse_segment_id, segment_path};
use hashlog::store::SegmentStore;
use hashlog::HashLogError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(dir: &Path, segment_size_limit: u64) -> Config {
    Config::builder()
        .data_dir(dir)
        .segment_size_limit(segment_size_limit)
        .compaction_threshold(None)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build()
}

fn setup_temp_store(segment_size_limit: u64) -> (TempDir, SegmentStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SegmentStore::open(config_for(temp_dir.path(), segment_size_limit)).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Open / Layout Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_first_segment() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("data");

    let store = SegmentStore::open(config_for(&dir, 1024)).unwrap();

    assert!(dir.is_dir());
    assert!(segment_path(&dir, 1).is_file());
    assert_eq!(store.segment_ids(), vec![1]);
}

#[test]
fn test_open_rejects_unknown_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

    let result = SegmentStore::open(config_for(temp_dir.path(), 1024));
    assert!(matches!(result, Err(HashLogError::InvalidLayout(_))));
}

#[test]
fn test_open_rejects_non_canonical_segment_name() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("segment-01"), b"").unwrap();

    let result = SegmentStore::open(config_for(temp_dir.path(), 1024));
    assert!(matches!(result, Err(HashLogError::InvalidLayout(_))));
}

#[test]
fn test_open_rejects_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("segment-2")).unwrap();

    let result = SegmentStore::open(config_for(temp_dir.path(), 1024));
    assert!(matches!(result, Err(HashLogError::InvalidLayout(_))));
}

#[test]
fn test_open_removes_interrupted_compaction_output() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = SegmentStore::open(config_for(temp_dir.path(), 1024)).unwrap();
        store.put(b"key", b"value").unwrap();
        store.close().unwrap();
    }
    let leftover = temp_dir.path().join("segment-1.compacting");
    fs::write(&leftover, b"partial garbage").unwrap();

    let store = SegmentStore::open(config_for(temp_dir.path(), 1024)).unwrap();

    assert!(!leftover.exists());
    assert_eq!(store.get(b"key").unwrap(), b"value");
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .segment_size_limit(0)
        .build();

    assert!(matches!(
        SegmentStore::open(config),
        Err(HashLogError::Config(_))
    ));
}

#[test]
fn test_parse_segment_id() {
    assert_eq!(parse_segment_id("segment-1"), Some(1));
    assert_eq!(parse_segment_id("segment-42"), Some(42));
    assert_eq!(parse_segment_id("segment-0"), None);
    assert_eq!(parse_segment_id("segment-042"), None);
    assert_eq!(parse_segment_id("segment-+1"), None);
    assert_eq!(parse_segment_id("segment-"), None);
    assert_eq!(parse_segment_id("segment-1.compacting"), None);
    assert_eq!(parse_segment_id("data.log"), None);
}

// =============================================================================
// Read / Write Tests
// =============================================================================

#[test]
fn test_put_get_delete() {
    let (_temp, store) = setup_temp_store(1024 * 1024);

    store.put(b"key", b"a").unwrap();
    store.put(b"key", b"b").unwrap();
    assert_eq!(store.get(b"key").unwrap(), b"b");

    store.delete(b"key").unwrap();
    assert!(store.get(b"key").unwrap_err().is_not_found());
    assert!(store.get(b"never").unwrap_err().is_not_found());
}

#[test]
fn test_get_falls_back_to_older_segments() {
    // Every record (69 bytes) crosses the 64-byte limit, so each put rotates
    let (_temp, store) = setup_temp_store(64);
    let value = vec![b'v'; 50];

    for i in 0..5 {
        store.put(format!("k{}", i).as_bytes(), &value).unwrap();
    }

    assert_eq!(store.segment_count(), 6);
    for i in 0..5 {
        assert_eq!(store.get(format!("k{}", i).as_bytes()).unwrap(), value);
    }
}

#[test]
fn test_newest_segment_wins() {
    let (_temp, store) = setup_temp_store(64);
    let filler = vec![b'x'; 60];

    store.put(b"key", &filler).unwrap(); // rotates
    store.put(b"key", b"newer").unwrap();

    assert_eq!(store.segment_count(), 2);
    assert_eq!(store.get(b"key").unwrap(), b"newer");
}

#[test]
fn test_tombstone_in_newer_segment_hides_older_value() {
    let (_temp, store) = setup_temp_store(64);
    let filler = vec![b'x'; 60];

    store.put(b"key", &filler).unwrap(); // rotates
    store.delete(b"key").unwrap();

    assert_eq!(store.segment_count(), 2);
    assert!(matches!(store.get(b"key"), Err(HashLogError::KeyNotFound)));
}

#[test]
fn test_delete_require_existing() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .delete_mode(DeleteMode::RequireExisting)
        .build();
    let store = SegmentStore::open(config).unwrap();

    assert!(store.delete(b"missing").unwrap_err().is_not_found());
    let tail_size = store.stats().tail().unwrap().size;
    assert_eq!(tail_size, 0, "rejected delete must not append");

    store.put(b"key", b"value").unwrap();
    store.delete(b"key").unwrap();
    assert!(store.delete(b"key").unwrap_err().is_not_found());
}

#[test]
fn test_delete_blind_accepts_missing_key() {
    let (_temp, store) = setup_temp_store(1024);

    store.delete(b"missing").unwrap();
    assert!(store.get(b"missing").unwrap_err().is_not_found());
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_no_rotation_below_threshold() {
    let (_temp, store) = setup_temp_store(1024);

    for i in 0..10 {
        store.put(format!("k{}", i).as_bytes(), b"small").unwrap();
    }

    assert_eq!(store.segment_count(), 1);
}

// Rotation runs after the append, so the oversized record closes out the old
// tail and the new tail starts empty rather than holding that record.
#[test]
fn test_oversized_record_rotates_exactly_once() {
    let (_temp, store) = setup_temp_store(1024);
    store.put(b"small", b"v").unwrap();
    let before = store.segment_count();

    let big = vec![0u8; 2000];
    store.put(b"big", &big).unwrap();

    let stats = store.stats();
    assert_eq!(stats.segment_count(), before + 1);
    let sealed = &stats.segments[stats.segment_count() - 2];
    assert_eq!(sealed.size, (17 + 5 + 1) + (17 + 3 + 2000));
    assert_eq!(stats.tail().unwrap().size, 0);
    assert_eq!(store.get(b"big").unwrap(), big);
}

#[test]
fn test_rotation_ids_strictly_increase() {
    let (_temp, store) = setup_temp_store(64);
    let filler = vec![b'x'; 60];

    for i in 0..4 {
        store.put(format!("k{}", i).as_bytes(), &filler).unwrap();
    }

    assert_eq!(store.segment_ids(), vec![1, 2, 3, 4, 5]);
    let stats = store.stats();
    assert!(stats.segments[..4].iter().all(|s| !s.is_tail));
    assert!(stats.tail().unwrap().is_tail);
}

#[test]
fn test_failed_rotation_keeps_acknowledged_write() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let store = SegmentStore::open(config_for(dir, 64)).unwrap();
    let filler = vec![b'x'; 60];

    // A directory squatting on the next segment name makes rotation fail
    fs::create_dir(segment_path(dir, 2)).unwrap();

    store.put(b"key", &filler).unwrap();
    assert_eq!(store.get(b"key").unwrap(), filler);
    assert_eq!(store.segment_ids(), vec![1]);

    // The next write rotates once the obstacle is gone
    fs::remove_dir(segment_path(dir, 2)).unwrap();
    store.put(b"next", b"v").unwrap();
    assert_eq!(store.segment_ids(), vec![1, 2]);
    assert_eq!(store.get(b"key").unwrap(), filler);
    assert_eq!(store.get(b"next").unwrap(), b"v");
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_recovers_all_segments() {
    let temp_dir = TempDir::new().unwrap();
    let filler = vec![b'x'; 60];
    {
        let store = SegmentStore::open(config_for(temp_dir.path(), 64)).unwrap();
        store.put(b"a", &filler).unwrap();
        store.put(b"b", &filler).unwrap();
        store.put(b"c", b"tail").unwrap();
        store.delete(b"a").unwrap();
        store.close().unwrap();
    }

    let store = SegmentStore::open(config_for(temp_dir.path(), 64)).unwrap();

    assert_eq!(store.segment_ids(), vec![1, 2, 3]);
    assert!(store.get(b"a").unwrap_err().is_not_found());
    assert_eq!(store.get(b"b").unwrap(), filler);
    assert_eq!(store.get(b"c").unwrap(), b"tail");

    // The recovered tail keeps accepting appends
    store.put(b"d", b"after").unwrap();
    assert_eq!(store.get(b"d").unwrap(), b"after");
    assert_eq!(store.segment_ids(), vec![1, 2, 3]);
}

#[test]
fn test_closed_store_rejects_operations() {
    let (_temp, store) = setup_temp_store(1024);
    store.put(b"key", b"value").unwrap();

    store.close().unwrap();
    store.close().unwrap();

    assert!(matches!(store.get(b"key"), Err(HashLogError::Closed)));
    assert!(matches!(store.put(b"key", b"v"), Err(HashLogError::Closed)));
}

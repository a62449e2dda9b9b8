//! Tests for the Atomic Writer
//!
//! These tests verify:
//! - Creating and replacing files
//! - Temp file naming and cleanup
//! - Interruption between staging and commit
//! - Identifier collisions

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use getsomedb::storage::{temp_path_for, write_atomic, AtomicWriter, SuffixSource, UuidSuffix};
use getsomedb::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_target() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.json");
    (temp_dir, path)
}

/// Always returns the same suffix
struct FixedSuffix(&'static str);

impl SuffixSource for FixedSuffix {
    fn next_suffix(&self) -> String {
        self.0.to_string()
    }
}

/// Returns 1, 2, 3, ...
#[derive(Default)]
struct CountingSuffix(AtomicU64);

impl SuffixSource for CountingSuffix {
    fn next_suffix(&self) -> String {
        (self.0.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

/// Names of everything in `dir`, sorted
fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Basic Write Tests
// =============================================================================

#[test]
fn test_write_creates_missing_file() {
    let (_temp, path) = setup_temp_target();

    write_atomic(&path, b"hello").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"hello");
}

#[test]
fn test_write_replaces_existing_contents() {
    let (_temp, path) = setup_temp_target();
    fs::write(&path, b"a much longer original payload").unwrap();

    write_atomic(&path, b"short").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"short");
}

#[test]
fn test_write_empty_payload() {
    let (_temp, path) = setup_temp_target();
    fs::write(&path, b"old").unwrap();

    write_atomic(&path, b"").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"");
}

#[test]
fn test_write_leaves_no_temp_files() {
    let (temp, path) = setup_temp_target();
    let writer = AtomicWriter::new();

    for i in 0..10 {
        writer.write(&path, format!("version {}", i).as_bytes()).unwrap();
    }

    assert_eq!(dir_entries(temp.path()), vec!["data.json".to_string()]);
    assert_eq!(fs::read(&path).unwrap(), b"version 9");
}

#[test]
fn test_write_into_missing_directory_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing").join("data.json");

    let err = write_atomic(&path, b"x").unwrap_err();

    assert!(matches!(err, StoreError::Io(_)));
    assert!(!path.exists());
    assert!(dir_entries(temp.path()).is_empty());
}

// =============================================================================
// Temp Path Tests
// =============================================================================

#[test]
fn test_temp_path_format() {
    let path = Path::new("/var/db/shop.json");

    let temp = temp_path_for(path, "abc123");

    assert_eq!(temp, PathBuf::from("/var/db/shop.json.temp.abc123"));
    assert_eq!(temp.parent(), path.parent());
}

#[test]
fn test_uuid_suffixes_are_distinct() {
    let source = UuidSuffix;

    let a = source.next_suffix();
    let b = source.next_suffix();

    assert_ne!(a, b);
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

// =============================================================================
// Staged Write / Interruption Tests
// =============================================================================

#[test]
fn test_staged_write_does_not_touch_target() {
    let (_temp, path) = setup_temp_target();
    fs::write(&path, b"old").unwrap();
    let writer = AtomicWriter::with_suffix_source(Arc::new(FixedSuffix("stage")));

    let staged = writer.stage(&path, b"new").unwrap();

    assert_eq!(staged.temp_path(), temp_path_for(&path, "stage").as_path());
    assert_eq!(staged.target(), path.as_path());
    assert_eq!(fs::read(staged.temp_path()).unwrap(), b"new");
    assert_eq!(fs::read(&path).unwrap(), b"old");

    staged.commit().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"new");
    assert!(!temp_path_for(&path, "stage").exists());
}

#[test]
fn test_dropped_staged_write_is_cleaned_up() {
    let (temp, path) = setup_temp_target();
    fs::write(&path, b"old").unwrap();
    let writer = AtomicWriter::new();

    let staged = writer.stage(&path, b"new").unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    assert!(temp_path.exists());
    drop(staged);

    assert!(!temp_path.exists());
    assert_eq!(fs::read(&path).unwrap(), b"old");
    assert_eq!(dir_entries(temp.path()), vec!["data.json".to_string()]);
}

#[test]
fn test_crash_before_rename_keeps_old_contents() {
    let (_temp, path) = setup_temp_target();
    fs::write(&path, b"old").unwrap();
    let writer = AtomicWriter::new();

    // A crash skips destructors: the temp file stays, the target is untouched.
    let staged = writer.stage(&path, b"new").unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    std::mem::forget(staged);

    assert_eq!(fs::read(&path).unwrap(), b"old");
    assert_eq!(fs::read(&temp_path).unwrap(), b"new");
}

#[test]
fn test_commit_failure_removes_temp_file() {
    let (temp, path) = setup_temp_target();
    // A directory at the target makes rename fail.
    fs::create_dir(&path).unwrap();
    fs::write(path.join("inside"), b"x").unwrap();
    let writer = AtomicWriter::new();

    let staged = writer.stage(&path, b"new").unwrap();
    let temp_path = staged.temp_path().to_path_buf();

    let err = staged.commit().unwrap_err();

    assert!(matches!(err, StoreError::Io(_)));
    assert!(!temp_path.exists());
    assert!(path.is_dir());
    assert_eq!(dir_entries(temp.path()), vec!["data.json".to_string()]);
}

// =============================================================================
// Collision Tests
// =============================================================================

#[test]
fn test_suffix_collision_fails_without_touching_existing_temp() {
    let (_temp, path) = setup_temp_target();
    fs::write(&path, b"old").unwrap();
    let colliding = temp_path_for(&path, "dup");
    fs::write(&colliding, b"someone else's").unwrap();
    let writer = AtomicWriter::with_suffix_source(Arc::new(FixedSuffix("dup")));

    let err = writer.write(&path, b"new").unwrap_err();

    match err {
        StoreError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("expected Io error, got {:?}", other),
    }
    assert_eq!(fs::read(&colliding).unwrap(), b"someone else's");
    assert_eq!(fs::read(&path).unwrap(), b"old");
}

#[test]
fn test_injected_suffix_source_is_used() {
    let (temp, path) = setup_temp_target();
    let writer = AtomicWriter::with_suffix_source(Arc::new(CountingSuffix::default()));

    let first = writer.stage(&path, b"1").unwrap();
    let second = writer.stage(&path, b"2").unwrap();

    assert_eq!(first.temp_path(), temp_path_for(&path, "1").as_path());
    assert_eq!(second.temp_path(), temp_path_for(&path, "2").as_path());
    assert_eq!(
        dir_entries(temp.path()),
        vec!["data.json.temp.1".to_string(), "data.json.temp.2".to_string()]
    );

    // Last commit wins
    first.commit().unwrap();
    second.commit().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"2");
}

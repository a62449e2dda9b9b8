//! Tests for SessionManager
//!
//! These tests verify:
//! - Session creation, lookup, and close
//! - Idempotent creation (one database per name)
//! - Name validation
//! - Failure propagation from database open
//! - Command dispatch
//! - Concurrent creation of the same name

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use getsomedb::protocol::Command;
use getsomedb::session::{validate_name, MAX_NAME_LEN};
use getsomedb::storage::{AtomicWriter, SuffixSource};
use getsomedb::{Config, SessionManager, StoreError, Value};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_manager() -> (TempDir, SessionManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = SessionManager::open(temp_dir.path()).unwrap();
    (temp_dir, manager)
}

/// Parks every write between picking a temp name and creating the file
struct StallingSuffix {
    entered: Barrier,
    release: Barrier,
}

impl StallingSuffix {
    fn new() -> Self {
        Self {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl SuffixSource for StallingSuffix {
    fn next_suffix(&self) -> String {
        self.entered.wait();
        self.release.wait();
        "stalled".to_string()
    }
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_data_directory() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("nested").join("storage");

    let manager = SessionManager::open(&data_dir).unwrap();

    assert!(data_dir.is_dir());
    assert_eq!(manager.data_dir(), data_dir.as_path());
    assert_eq!(manager.session_count(), 0);
}

#[test]
fn test_from_config_uses_data_dir() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp.path().join("db")).build();

    let manager = SessionManager::from_config(&config).unwrap();

    assert_eq!(manager.data_dir(), config.data_dir.as_path());
}

// =============================================================================
// Create / Get / Close Tests
// =============================================================================

#[test]
fn test_create_session_binds_named_file() {
    let (temp, manager) = setup_temp_manager();

    let session = manager.create_session("shop").unwrap();

    assert_eq!(session.name(), "shop");
    assert_eq!(session.database().name(), "shop");
    assert_eq!(session.database().path(), temp.path().join("shop.json").as_path());
}

#[test]
fn test_create_session_is_idempotent() {
    let (_temp, manager) = setup_temp_manager();

    let first = manager.create_session("x").unwrap();
    let second = manager.create_session("x").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.shares_database_with(&second));
    assert_eq!(manager.session_count(), 1);

    first.database().create("k", json!("v")).unwrap();
    assert_eq!(second.database().read("k").unwrap(), json!("v"));
}

#[test]
fn test_create_session_loads_existing_file() {
    let (temp, manager) = setup_temp_manager();
    fs::write(temp.path().join("users.json"), r#"{"ada": {"admin": true}}"#).unwrap();

    let session = manager.create_session("users").unwrap();

    assert_eq!(session.database().read("ada").unwrap(), json!({"admin": true}));
}

#[test]
fn test_create_session_with_malformed_file_registers_nothing() {
    let (temp, manager) = setup_temp_manager();
    fs::write(temp.path().join("broken.json"), b"{{{").unwrap();

    let err = manager.create_session("broken").unwrap_err();

    assert!(matches!(err, StoreError::Serialization(_)));
    assert!(matches!(
        manager.get_session("broken").unwrap_err(),
        StoreError::SessionNotFound(_)
    ));
    assert_eq!(manager.session_count(), 0);
}

#[test]
fn test_get_session_never_creates() {
    let (temp, manager) = setup_temp_manager();

    let err = manager.get_session("ghost").unwrap_err();

    assert!(matches!(err, StoreError::SessionNotFound(ref n) if n == "ghost"));
    assert_eq!(manager.session_count(), 0);
    assert!(!temp.path().join("ghost.json").exists());
}

#[test]
fn test_get_session_returns_registered() {
    let (_temp, manager) = setup_temp_manager();
    let created = manager.create_session("a").unwrap();

    let fetched = manager.get_session("a").unwrap();

    assert!(Arc::ptr_eq(&created, &fetched));
}

#[test]
fn test_close_then_get_scenario() {
    let (_temp, manager) = setup_temp_manager();

    manager.create_session("shop").unwrap();
    manager.create_session("shop").unwrap();
    manager.close_session("shop").unwrap();

    assert!(matches!(
        manager.get_session("shop").unwrap_err(),
        StoreError::SessionNotFound(ref n) if n == "shop"
    ));
    assert!(matches!(
        manager.get_session("other").unwrap_err(),
        StoreError::SessionNotFound(ref n) if n == "other"
    ));
}

#[test]
fn test_close_unknown_session_fails() {
    let (_temp, manager) = setup_temp_manager();

    let err = manager.close_session("never").unwrap_err();

    assert!(matches!(err, StoreError::SessionNotFound(_)));
}

#[test]
fn test_close_twice_fails_second_time() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_session("x").unwrap();

    manager.close_session("x").unwrap();

    assert!(matches!(manager.close_session("x"), Err(StoreError::SessionNotFound(_))));
}

#[test]
fn test_close_keeps_file_and_data() {
    let (temp, manager) = setup_temp_manager();
    let session = manager.create_session("keep").unwrap();
    session.database().create("k", json!([1, 2])).unwrap();
    drop(session);

    manager.close_session("keep").unwrap();

    assert!(temp.path().join("keep.json").exists());
    let reopened = manager.create_session("keep").unwrap();
    assert_eq!(reopened.database().read("k").unwrap(), json!([1, 2]));
}

#[test]
fn test_closed_session_handle_keeps_working() {
    let (_temp, manager) = setup_temp_manager();
    let session = manager.create_session("live").unwrap();

    manager.close_session("live").unwrap();

    session.database().create("after-close", json!(1)).unwrap();
    assert_eq!(session.database().read("after-close").unwrap(), json!(1));
}

#[test]
fn test_recreate_while_old_handle_alive_shares_database() {
    let (_temp, manager) = setup_temp_manager();
    let old = manager.create_session("x").unwrap();
    manager.close_session("x").unwrap();

    let new = manager.create_session("x").unwrap();

    assert!(!Arc::ptr_eq(&old, &new));
    assert!(old.shares_database_with(&new));
    old.database().create("from-old", json!(true)).unwrap();
    assert_eq!(new.database().read("from-old").unwrap(), json!(true));
}

#[test]
fn test_recreate_after_handles_dropped_reloads_from_disk() {
    let (_temp, manager) = setup_temp_manager();
    let old = manager.create_session("x").unwrap();
    old.database().create("k", json!(1)).unwrap();
    let old_db = old.database_handle();
    manager.close_session("x").unwrap();
    drop(old);
    drop(old_db);

    let new = manager.create_session("x").unwrap();

    assert_eq!(new.database().read("k").unwrap(), json!(1));
}

#[test]
fn test_list_sessions_sorted() {
    let (_temp, manager) = setup_temp_manager();
    for name in ["zeta", "alpha", "mid"] {
        manager.create_session(name).unwrap();
    }
    manager.close_session("mid").unwrap();

    assert_eq!(manager.list_sessions(), vec!["alpha", "zeta"]);
}

#[test]
fn test_sessions_are_independent() {
    let (temp, manager) = setup_temp_manager();
    let a = manager.create_session("a").unwrap();
    let b = manager.create_session("b").unwrap();

    a.database().create("k", json!("in a")).unwrap();

    assert!(matches!(b.database().read("k"), Err(StoreError::KeyNotFound(_))));
    assert!(temp.path().join("a.json").exists());
    assert!(!temp.path().join("b.json").exists());
}

// =============================================================================
// Name Validation Tests
// =============================================================================

#[test]
fn test_valid_names() {
    for name in ["shop", "user-data", "v1.2", "A_b-9", "x"] {
        assert!(validate_name(name).is_ok(), "{} should be valid", name);
    }
    assert!(validate_name(&"n".repeat(MAX_NAME_LEN)).is_ok());
}

#[test]
fn test_invalid_names() {
    let long = "n".repeat(MAX_NAME_LEN + 1);
    for name in ["", ".hidden", "..", "a/b", "../escape", "a\\b", "sp ace", "ünï", long.as_str()] {
        assert!(
            matches!(validate_name(name), Err(StoreError::InvalidName(_))),
            "{:?} should be invalid",
            name
        );
    }
}

#[test]
fn test_create_session_rejects_path_escape() {
    let (temp, manager) = setup_temp_manager();

    let err = manager.create_session("../outside").unwrap_err();

    assert!(matches!(err, StoreError::InvalidName(_)));
    assert_eq!(manager.session_count(), 0);
    assert!(!temp.path().parent().unwrap().join("outside.json").exists());
}

// =============================================================================
// Command Dispatch Tests
// =============================================================================

#[test]
fn test_execute_full_lifecycle() {
    let (_temp, manager) = setup_temp_manager();
    let db = "orders".to_string();
    let key = "o1".to_string();

    assert_eq!(manager.execute(Command::CreateSession { db: db.clone() }).unwrap(), None);
    manager
        .execute(Command::Create { db: db.clone(), key: key.clone(), value: json!({"qty": 1}) })
        .unwrap();
    manager
        .execute(Command::Update { db: db.clone(), key: key.clone(), value: json!({"qty": 2}) })
        .unwrap();

    let value = manager
        .execute(Command::Read { db: db.clone(), key: key.clone() })
        .unwrap();
    assert_eq!(value, Some(json!({"qty": 2})));

    manager.execute(Command::Delete { db: db.clone(), key: key.clone() }).unwrap();
    assert!(matches!(
        manager.execute(Command::Read { db: db.clone(), key }),
        Err(StoreError::KeyNotFound(_))
    ));

    manager.execute(Command::CloseSession { db }).unwrap();
    assert_eq!(manager.session_count(), 0);
}

#[test]
fn test_execute_data_command_without_session() {
    let (_temp, manager) = setup_temp_manager();

    let err = manager
        .execute(Command::Create { db: "nosession".into(), key: "k".into(), value: json!(1) })
        .unwrap_err();

    assert!(matches!(err, StoreError::SessionNotFound(_)));
}

#[test]
fn test_execute_ping() {
    let (_temp, manager) = setup_temp_manager();

    let reply = manager.execute(Command::Ping).unwrap();

    assert_eq!(reply, Some(Value::String("PONG".to_string())));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_create_session_yields_one_database() {
    let (_temp, manager) = setup_temp_manager();
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.create_session("shared").unwrap()
            })
        })
        .collect();

    let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
    assert_eq!(manager.session_count(), 1);
}

#[test]
fn test_concurrent_writes_through_different_sessions() {
    let (_temp, manager) = setup_temp_manager();
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let name = format!("db{}", t);
                let session = manager.create_session(&name).unwrap();
                for i in 0..10 {
                    session.database().create(&format!("k{}", i), json!(i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.session_count(), 4);
    for t in 0..4 {
        let session = manager.get_session(&format!("db{}", t)).unwrap();
        assert_eq!(session.database().len(), 10);
    }
}

#[test]
fn test_stalled_write_does_not_block_registry() {
    let temp = TempDir::new().unwrap();
    let suffixes = Arc::new(StallingSuffix::new());
    let writer = AtomicWriter::with_suffix_source(suffixes.clone());
    let manager = SessionManager::with_writer(temp.path(), writer).unwrap();
    let a = manager.create_session("a").unwrap();

    thread::scope(|s| {
        let write = s.spawn(|| a.database().create("k", json!(1)));
        suffixes.entered.wait();

        // "a" is mid-write and holds its database lock
        let b = manager.create_session("b").unwrap();
        assert!(b.database().is_empty());
        assert!(manager.get_session("a").is_ok());
        assert_eq!(manager.list_sessions(), vec!["a".to_string(), "b".to_string()]);
        manager.close_session("b").unwrap();

        suffixes.release.wait();
        write.join().unwrap().unwrap();
    });

    assert_eq!(a.database().read("k").unwrap(), json!(1));
}

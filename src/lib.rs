//! # GetSomeDB
//!
//! A minimal durable key-value store with:
//! - JSON values held in memory, one snapshot file per database
//! - Crash-safe writes (temp file + fsync + rename)
//! - Shared-reader / exclusive-writer locking per database
//! - Named sessions multiplexing many databases in one process
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Session Manager                             │
//! │              (name → Session, Mutex)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Database   │          │  Database   │
//!   │  (RwLock)   │          │  (RwLock)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │AtomicWriter │          │AtomicWriter │
//!   │ shop.json   │          │ users.json  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod database;
pub mod session;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use database::{Database, Value};
pub use session::{Session, SessionManager};
pub use storage::AtomicWriter;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of GetSomeDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

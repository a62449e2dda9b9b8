//! Database Module
//!
//! A named, durable map from string keys to JSON values.
//!
//! ## Responsibilities
//! - Load the backing file on open (missing file = empty database)
//! - Serve reads from memory under a shared lock
//! - Persist the whole map on every mutation under an exclusive lock
//! - Keep memory and disk in agreement when a write fails
//!
//! ## File Format
//! One JSON object, keys are the stored keys, pretty-printed with two-space
//! indentation:
//! ```text
//! {
//!   "a": 1,
//!   "cart": {
//!     "items": []
//!   }
//! }
//! ```

mod durable;

pub use durable::Database;

/// A stored value: any JSON datum
pub type Value = serde_json::Value;

/// File extension for database files
pub const FILE_EXTENSION: &str = "json";

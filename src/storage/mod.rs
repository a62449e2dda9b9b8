//! Storage Module
//!
//! Crash-safe file replacement used by every database write.
//!
//! ## Responsibilities
//! - Replace a file's contents so readers see old or new, never partial
//! - Keep temporary files on the same filesystem as their target
//! - Clean up temporary files on failure
//!
//! ## Write Sequence
//! ```text
//!   <path>.temp.<id>            <path>
//!   ┌──────────────┐            ┌──────────────┐
//!   │ create_new   │            │ old snapshot │
//!   │ write_all    │            │              │
//!   │ sync_all     │── rename ─▶│ new snapshot │
//!   └──────────────┘            └──────────────┘
//! ```
//!
//! The temporary suffix comes from a [`SuffixSource`]; the default draws
//! random UUIDs.

mod atomic;
mod suffix;

pub use atomic::{temp_path_for, write_atomic, AtomicWriter, StagedWrite};
pub use suffix::{SuffixSource, UuidSuffix};

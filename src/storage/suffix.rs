//! Temporary file suffixes
//!
//! Sources of distinct identifiers for `<path>.temp.<id>` files.

use uuid::Uuid;

/// Produces identifiers for temporary file names
///
/// The only requirement is a negligible chance of two calls returning the
/// same identifier for files in one directory.
pub trait SuffixSource: Send + Sync {
    fn next_suffix(&self) -> String;
}

/// Random UUID v4 suffixes (32 hex characters, no hyphens)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSuffix;

impl SuffixSource for UuidSuffix {
    fn next_suffix(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

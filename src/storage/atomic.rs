//! Atomic Writer
//!
//! Replaces a file's contents via temp file + fsync + rename.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;

use super::{SuffixSource, UuidSuffix};

/// Infix between the target path and the random identifier
const TEMP_INFIX: &str = ".temp.";

/// Replaces file contents atomically
///
/// Cheap to clone; clones share the same suffix source.
#[derive(Clone)]
pub struct AtomicWriter {
    suffixes: Arc<dyn SuffixSource>,
}

impl AtomicWriter {
    /// Create a writer using random UUID suffixes
    pub fn new() -> Self {
        Self::with_suffix_source(Arc::new(UuidSuffix))
    }

    /// Create a writer drawing temp suffixes from `suffixes`
    pub fn with_suffix_source(suffixes: Arc<dyn SuffixSource>) -> Self {
        Self { suffixes }
    }

    /// Replace the contents of `path` with `bytes`
    ///
    /// A reader of `path` sees either the previous contents or `bytes` in
    /// full, never a mix, even if the process dies part way through.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.stage(path, bytes)?.commit()
    }

    /// Write `bytes` to a fresh temp file next to `path` and sync it
    ///
    /// Nothing at `path` changes until [`StagedWrite::commit`]. Dropping the
    /// returned value without committing removes the temp file.
    pub fn stage(&self, path: &Path, bytes: &[u8]) -> Result<StagedWrite> {
        let temp_path = temp_path_for(path, &self.suffixes.next_suffix());

        // An existing file here means an identifier collision. It is not ours
        // to remove, so fail before a StagedWrite takes ownership of the path.
        let file = create_exclusive(&temp_path)?;

        let staged = StagedWrite {
            temp_path,
            target: path.to_path_buf(),
            committed: false,
        };

        write_and_sync(file, bytes)?;

        debug!(
            target_path = %staged.target.display(),
            temp_path = %staged.temp_path.display(),
            size_bytes = bytes.len(),
            "Staged atomic write"
        );

        Ok(staged)
    }
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully written and synced temp file waiting to replace its target
#[must_use = "a staged write does nothing until committed"]
pub struct StagedWrite {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Path of the temp file holding the new contents
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Path that will be replaced on commit
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target
    ///
    /// On failure the target is untouched and the temp file is removed.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target)?;
        self.committed = true;

        sync_parent_dir(&self.target);

        debug!(path = %self.target.display(), "Atomic rename completed");
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.temp_path) {
            warn!(
                temp_path = %self.temp_path.display(),
                error = %e,
                "Failed to clean up temp file"
            );
        }
    }
}

/// Replace the contents of `path` with `bytes` using a default writer
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicWriter::new().write(path, bytes)
}

/// Build `<path>.temp.<suffix>`
///
/// Appends to the full file name rather than swapping the extension, so the
/// temp file always sits in the same directory as `path`.
pub fn temp_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_INFIX);
    name.push(suffix);
    PathBuf::from(name)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn create_exclusive(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o664);
    }

    options.open(path)
}

fn write_and_sync(mut file: File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()
}

/// Best effort: the rename is already visible, so a failure here only
/// weakens durability of the directory entry and is not reported.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!(dir = %parent.display(), error = %e, "Failed to sync directory");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

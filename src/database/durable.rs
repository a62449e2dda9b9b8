//! Durable map implementation
//!
//! BTreeMap behind a RwLock, mirrored to one file via the atomic writer.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::storage::AtomicWriter;

use super::Value;

type Entries = BTreeMap<String, Value>;

/// A named database held in memory and mirrored to one file
///
/// ## Concurrency
/// - `read` takes the shared lock and never touches disk
/// - `create`/`update`/`delete` take the exclusive lock and keep it until the
///   new snapshot is renamed into place
///
/// Holding the lock across the fsync means a slow disk stalls every caller of
/// this database. That is accepted for small, low-write-rate databases.
/// Building the snapshot off-lock and swapping it in under a brief lock would
/// remove the stall if it ever matters.
///
/// ## Failed writes
/// A mutation is applied in place, then persisted. If persisting fails the
/// mutation is undone before the lock is released, so memory always matches
/// the last snapshot that reached disk.
pub struct Database {
    /// Database name (as registered in the session manager)
    name: String,

    /// Backing file
    path: PathBuf,

    /// Live key/value map
    entries: RwLock<Entries>,

    /// Replaces the backing file on every mutation
    writer: AtomicWriter,
}

impl Database {
    /// Open a database backed by `path`
    ///
    /// A missing file gives an empty database. Any other read failure, or
    /// contents that are not a JSON object, fails the open.
    pub fn open(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        writer: AtomicWriter,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        let entries = Self::load(&path)?;

        debug!(
            database = %name,
            path = %path.display(),
            keys = entries.len(),
            "Database loaded"
        );

        Ok(Self {
            name,
            path,
            entries: RwLock::new(entries),
            writer,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses the file stem as the name and a default atomic writer
    pub fn open_path(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::open(name, path, AtomicWriter::new())
    }

    /// Insert a new key
    ///
    /// Fails with `AlreadyExists` (and writes nothing) if the key is present.
    pub fn create(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write();

        if entries.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        entries.insert(key.to_string(), value);

        self.persist_or_undo(&mut entries, "create", |entries| {
            entries.remove(key);
        })
    }

    /// Get the value stored under a key
    pub fn read(&self, key: &str) -> Result<Value> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Replace the value of an existing key
    pub fn update(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write();

        let slot = entries
            .get_mut(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        let previous = std::mem::replace(slot, value);

        self.persist_or_undo(&mut entries, "update", move |entries| {
            entries.insert(key.to_string(), previous);
        })
    }

    /// Remove an existing key
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();

        let previous = entries
            .remove(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;

        self.persist_or_undo(&mut entries, "delete", move |entries| {
            entries.insert(key.to_string(), previous);
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn load(path: &Path) -> Result<Entries> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the whole map to disk; on failure run `undo` and return the error
    ///
    /// Called with the exclusive lock held.
    fn persist_or_undo<F>(&self, entries: &mut Entries, op: &str, undo: F) -> Result<()>
    where
        F: FnOnce(&mut Entries),
    {
        match self.persist(entries) {
            Ok(()) => {
                debug!(database = %self.name, op, keys = entries.len(), "Snapshot persisted");
                Ok(())
            }
            Err(e) => {
                undo(entries);
                warn!(
                    database = %self.name,
                    op,
                    error = %e,
                    "Persist failed, mutation undone"
                );
                Err(e)
            }
        }
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        self.writer.write(&self.path, &bytes)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("keys", &self.entries.try_read().map(|e| e.len()))
            .finish()
    }
}

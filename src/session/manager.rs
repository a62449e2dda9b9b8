//! Session Manager
//!
//! Process-wide table of open sessions, keyed by database name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{Database, Value, FILE_EXTENSION};
use crate::error::{Result, StoreError};
use crate::protocol::Command;
use crate::storage::AtomicWriter;

use super::Session;

/// Longest accepted database name, in bytes
pub const MAX_NAME_LEN: usize = 128;

/// Registry state guarded by the manager's lock
#[derive(Default)]
struct Registry {
    /// Registered sessions
    open: HashMap<String, Arc<Session>>,

    /// Databases of closed sessions that may still be in use by callers
    closed: HashMap<String, Weak<Database>>,

    /// Gates of names being opened right now; serializes opening one database
    gates: HashMap<String, Arc<Mutex<()>>>,
}

impl Registry {
    /// Give back the caller's clone of `gate`, removing the entry if no
    /// other opener holds one
    ///
    /// Clones are taken and dropped only under the registry lock, so a count
    /// of two (map + caller) means nobody else is waiting. Otherwise the last
    /// waiter removes it.
    fn release_gate(&mut self, name: &str, gate: Arc<Mutex<()>>) {
        let idle = self
            .gates
            .get(name)
            .map_or(false, |g| Arc::ptr_eq(g, &gate) && Arc::strong_count(g) == 2);
        if idle {
            self.gates.remove(name);
        }
    }
}

/// Outcome of opening a name under its gate
enum Loaded {
    /// Another caller registered it first
    Registered(Arc<Session>),
    /// Ready to be registered
    Database(Arc<Database>),
}

/// Owns the name → session table
///
/// ## Concurrency:
/// - `sessions`: one Mutex, held only for lookups and inserts
/// - Loading a database file happens outside that Mutex, behind a per-name
///   gate, so opening "shop" never blocks lookups of "users"
/// - All methods use `&self`; share the manager through `Arc`
///
/// ## Invariant:
/// At most one `Database` exists per name. A name re-created while a caller
/// still holds the database of its closed session gets that same database
/// back instead of a second copy of the file.
pub struct SessionManager {
    /// Directory holding `<name>.json` files
    data_dir: PathBuf,

    /// Writer handed to every database
    writer: AtomicWriter,

    /// Session table
    sessions: Mutex<Registry>,
}

impl SessionManager {
    /// Open a manager over `data_dir`, creating the directory if needed
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_writer(data_dir, AtomicWriter::new())
    }

    /// Open a manager from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.data_dir.clone())
    }

    /// Open a manager whose databases persist through `writer`
    pub fn with_writer(data_dir: impl Into<PathBuf>, writer: AtomicWriter) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        Ok(Self {
            data_dir,
            writer,
            sessions: Mutex::new(Registry::default()),
        })
    }

    /// Return the session for `name`, creating it if needed
    ///
    /// Creating an already-open name returns the existing session. If the
    /// database cannot be opened nothing is registered.
    pub fn create_session(&self, name: &str) -> Result<Arc<Session>> {
        let path = self.database_path(name)?;

        let gate = {
            let mut registry = self.sessions.lock();
            if let Some(session) = registry.open.get(name) {
                return Ok(Arc::clone(session));
            }
            Arc::clone(registry.gates.entry(name.to_string()).or_default())
        };

        let opening = gate.lock();
        let loaded = self.load_database(name, &path);

        let mut registry = self.sessions.lock();
        let result = loaded.map(|loaded| match loaded {
            Loaded::Registered(session) => session,
            Loaded::Database(database) => {
                let session = Arc::new(Session::new(name, database));
                registry.open.insert(name.to_string(), Arc::clone(&session));
                info!(database = %name, path = %path.display(), "Session created");
                session
            }
        });
        drop(opening);
        registry.release_gate(name, gate);

        result
    }

    /// Find or load the database for `name`; called with its gate held
    fn load_database(&self, name: &str, path: &Path) -> Result<Loaded> {
        // Someone may have finished opening this name while we waited.
        let revived = {
            let mut registry = self.sessions.lock();
            if let Some(session) = registry.open.get(name) {
                return Ok(Loaded::Registered(Arc::clone(session)));
            }
            registry.closed.remove(name).and_then(|db| db.upgrade())
        };

        match revived {
            Some(database) => {
                debug!(database = %name, "Reusing database of closed session");
                Ok(Loaded::Database(database))
            }
            None => {
                let database = Database::open(name, path, self.writer.clone())?;
                Ok(Loaded::Database(Arc::new(database)))
            }
        }
    }

    /// Return the registered session for `name`
    ///
    /// Never creates one.
    pub fn get_session(&self, name: &str) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .open
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(name.to_string()))
    }

    /// Unregister the session for `name`
    ///
    /// The database file stays on disk and the database itself is not
    /// touched; callers already holding it can keep using it.
    pub fn close_session(&self, name: &str) -> Result<()> {
        let mut registry = self.sessions.lock();

        let session = registry
            .open
            .remove(name)
            .ok_or_else(|| StoreError::SessionNotFound(name.to_string()))?;

        registry.closed.retain(|_, db| db.strong_count() > 0);
        registry
            .closed
            .insert(name.to_string(), Arc::downgrade(&session.database_handle()));

        info!(database = %name, "Session closed");
        Ok(())
    }

    /// Execute a command
    ///
    /// Routes commands to the registry or to the session's database. Data
    /// commands need the session to have been created first.
    pub fn execute(&self, command: Command) -> Result<Option<Value>> {
        match command {
            Command::CreateSession { db } => {
                self.create_session(&db)?;
                Ok(None)
            }
            Command::CloseSession { db } => {
                self.close_session(&db)?;
                Ok(None)
            }
            Command::Create { db, key, value } => {
                self.get_session(&db)?.database().create(&key, value)?;
                Ok(None)
            }
            Command::Read { db, key } => {
                let value = self.get_session(&db)?.database().read(&key)?;
                Ok(Some(value))
            }
            Command::Update { db, key, value } => {
                self.get_session(&db)?.database().update(&key, value)?;
                Ok(None)
            }
            Command::Delete { db, key } => {
                self.get_session(&db)?.database().delete(&key)?;
                Ok(None)
            }
            Command::Ping => Ok(Some(Value::String("PONG".to_string()))),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Names of all open sessions, sorted
    pub fn list_sessions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.lock().open.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().open.len()
    }

    /// Directory holding the database files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File backing the database called `name`
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.data_dir.join(format!("{}.{}", name, FILE_EXTENSION)))
    }
}

/// Check that `name` maps to a plain file inside the data directory
///
/// Accepts 1..=128 bytes of ASCII letters, digits, `-`, `_` and `.`, not
/// starting with `.`.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

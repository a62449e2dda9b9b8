//! Session handle

use std::sync::Arc;

use crate::database::Database;

/// A live handle to one database, registered under its name
///
/// Carries no state of its own; clones of the `Arc<Session>` returned by the
/// manager all reach the same `Database`.
#[derive(Debug)]
pub struct Session {
    name: String,
    database: Arc<Database>,
}

impl Session {
    pub(crate) fn new(name: impl Into<String>, database: Arc<Database>) -> Self {
        Self {
            name: name.into(),
            database,
        }
    }

    /// Name the session is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database behind this session
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// A shared handle to the database that outlives the session
    pub fn database_handle(&self) -> Arc<Database> {
        Arc::clone(&self.database)
    }

    /// True if both sessions reach the same in-memory database
    pub fn shares_database_with(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.database, &other.database)
    }
}

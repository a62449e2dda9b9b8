//! Session Module
//!
//! Named handles onto databases, multiplexed behind one registry.
//!
//! ## Responsibilities
//! - Map a database name to exactly one live `Database` per process
//! - Create sessions lazily and idempotently
//! - Unregister sessions without touching their data
//! - Translate wire commands into database calls
//!
//! ## Locking
//! ```text
//!   SessionManager ── Mutex<Registry> ─┬─ "shop"  → Session → Database (RwLock)
//!                                      └─ "users" → Session → Database (RwLock)
//! ```
//! The registry lock is never held while a database reads or writes its file.

mod manager;
mod handle;

pub use manager::{validate_name, SessionManager, MAX_NAME_LEN};
pub use handle::Session;

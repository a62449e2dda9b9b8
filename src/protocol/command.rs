//! Command definitions
//!
//! Represents requests from clients.

use crate::database::Value;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    CreateSession = 0x01,
    CloseSession = 0x02,
    Create = 0x03,
    Read = 0x04,
    Update = 0x05,
    Delete = 0x06,
    Ping = 0x07,
}

impl CommandType {
    /// Parse a wire tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(CommandType::CreateSession),
            0x02 => Some(CommandType::CloseSession),
            0x03 => Some(CommandType::Create),
            0x04 => Some(CommandType::Read),
            0x05 => Some(CommandType::Update),
            0x06 => Some(CommandType::Delete),
            0x07 => Some(CommandType::Ping),
            _ => None,
        }
    }

    /// Upper-case name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            CommandType::CreateSession => "CREATE_SESSION",
            CommandType::CloseSession => "CLOSE_SESSION",
            CommandType::Create => "CREATE",
            CommandType::Read => "READ",
            CommandType::Update => "UPDATE",
            CommandType::Delete => "DELETE",
            CommandType::Ping => "PING",
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open (or reuse) the session for a database
    CreateSession { db: String },

    /// Unregister a session
    CloseSession { db: String },

    /// Insert a new key
    Create { db: String, key: String, value: Value },

    /// Get a value by key
    Read { db: String, key: String },

    /// Replace the value of an existing key
    Update { db: String, key: String, value: Value },

    /// Remove a key
    Delete { db: String, key: String },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::CreateSession { .. } => CommandType::CreateSession,
            Command::CloseSession { .. } => CommandType::CloseSession,
            Command::Create { .. } => CommandType::Create,
            Command::Read { .. } => CommandType::Read,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Database the command targets, if any
    pub fn database(&self) -> Option<&str> {
        match self {
            Command::CreateSession { db }
            | Command::CloseSession { db }
            | Command::Create { db, .. }
            | Command::Read { db, .. }
            | Command::Update { db, .. }
            | Command::Delete { db, .. } => Some(db),
            Command::Ping => None,
        }
    }
}

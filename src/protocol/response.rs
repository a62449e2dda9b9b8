//! Response definitions
//!
//! Represents responses to clients.

use crate::database::Value;
use crate::error::{Result, StoreError};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Conflict = 0x02,
    BadRequest = 0x03,
    Error = 0x04,
}

impl Status {
    /// Parse a wire tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Conflict),
            0x03 => Some(Status::BadRequest),
            0x04 => Some(Status::Error),
            _ => None,
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (JSON value for READ, error message otherwise)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create an OK response carrying a JSON value
    pub fn value(value: &Value) -> Self {
        Self::ok(Some(value.to_string().into_bytes()))
    }

    /// Create a NOT_FOUND response
    pub fn not_found(message: &str) -> Self {
        Self::with_message(Status::NotFound, message)
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self::with_message(Status::Error, message)
    }

    /// Map a store error onto a status
    pub fn from_error(err: &StoreError) -> Self {
        let status = match err {
            StoreError::KeyNotFound(_) | StoreError::SessionNotFound(_) => Status::NotFound,
            StoreError::AlreadyExists(_) => Status::Conflict,
            StoreError::InvalidName(_) | StoreError::Protocol(_) => Status::BadRequest,
            _ => Status::Error,
        };
        Self::with_message(status, &err.to_string())
    }

    /// Decode the payload as a JSON value
    ///
    /// Returns `None` for an empty payload.
    pub fn json(&self) -> Result<Option<Value>> {
        match &self.payload {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    /// The payload as text (error message or raw JSON)
    pub fn message(&self) -> Option<String> {
        self.payload
            .as_ref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    fn with_message(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }
}

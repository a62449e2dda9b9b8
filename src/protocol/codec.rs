//! Frame codec
//!
//! Requests and responses share one frame shape, a tag byte and a big-endian
//! payload length:
//!
//! ```text
//!   tag (1) | len (4, BE) | payload (len bytes)
//! ```
//!
//! For requests the tag is a [`CommandType`]; payload fields are
//! `len (4) + UTF-8`, and a JSON value takes whatever follows the last field:
//!
//! ```text
//!   CREATE_SESSION, CLOSE_SESSION   db
//!   CREATE, UPDATE                  db, key, value
//!   READ, DELETE                    db, key
//!   PING                            (empty)
//! ```
//!
//! For responses the tag is a [`Status`] and the payload is either a JSON
//! value (successful READ and PING) or a UTF-8 error message.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::database::Value;
use crate::error::{Result, StoreError};

use super::{Command, CommandType, Response, Status};

/// Tag byte plus length word
pub const HEADER_SIZE: usize = 5;

/// Frames above this are refused before any payload is read or written
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

const COMMAND: &str = "command";
const RESPONSE: &str = "response";

// =============================================================================
// Commands
// =============================================================================

pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();

    match command {
        Command::CreateSession { db } | Command::CloseSession { db } => {
            put_field(&mut payload, db);
        }
        Command::Create { db, key, value } | Command::Update { db, key, value } => {
            put_field(&mut payload, db);
            put_field(&mut payload, key);
            payload.put_slice(value.to_string().as_bytes());
        }
        Command::Read { db, key } | Command::Delete { db, key } => {
            put_field(&mut payload, db);
            put_field(&mut payload, key);
        }
        Command::Ping => {}
    }

    frame(command.command_type() as u8, &payload)
}

/// Parse one complete command frame
///
/// Missing fields, bad UTF-8, bad JSON, and leftover bytes are all
/// `Protocol` errors naming the command.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (tag, mut payload) = split_frame(bytes, COMMAND)?;

    let cmd_type = CommandType::from_u8(tag).ok_or_else(|| {
        StoreError::Protocol(format!("Unknown command type: 0x{:02x}", tag))
    })?;
    let name = cmd_type.name();
    let buf = &mut payload;

    let command = match cmd_type {
        CommandType::CreateSession => Command::CreateSession {
            db: get_field(buf, name, "db")?,
        },
        CommandType::CloseSession => Command::CloseSession {
            db: get_field(buf, name, "db")?,
        },
        CommandType::Create => Command::Create {
            db: get_field(buf, name, "db")?,
            key: get_field(buf, name, "key")?,
            value: get_value(buf, name)?,
        },
        CommandType::Read => Command::Read {
            db: get_field(buf, name, "db")?,
            key: get_field(buf, name, "key")?,
        },
        CommandType::Update => Command::Update {
            db: get_field(buf, name, "db")?,
            key: get_field(buf, name, "key")?,
            value: get_value(buf, name)?,
        },
        CommandType::Delete => Command::Delete {
            db: get_field(buf, name, "db")?,
            key: get_field(buf, name, "key")?,
        },
        CommandType::Ping => Command::Ping,
    };

    if buf.has_remaining() {
        return Err(StoreError::Protocol(format!(
            "{} command: unexpected trailing {} bytes",
            name,
            buf.remaining()
        )));
    }

    Ok(command)
}

// =============================================================================
// Responses
// =============================================================================

pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Parse one complete response frame; an empty payload becomes `None`
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (tag, payload) = split_frame(bytes, RESPONSE)?;

    let status = Status::from_u8(tag).ok_or_else(|| {
        StoreError::Protocol(format!("Unknown response status: 0x{:02x}", tag))
    })?;

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Streams
// =============================================================================

/// Block until one full command frame has arrived, then decode it
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_command_frame(reader)?;
    decode_command(&message)
}

/// Block until one full command frame has arrived and return it undecoded
///
/// An error here leaves the stream at an unknown position. Once this returns
/// `Ok`, the next frame starts right after it whether or not the body decodes.
pub fn read_command_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    read_frame(reader, COMMAND)
}

/// Encode, write, and flush
///
/// A command whose payload exceeds [`MAX_PAYLOAD_SIZE`] is refused with
/// `Protocol` and nothing is written.
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    write_frame(writer, &encode_command(command), COMMAND)
}

pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader, RESPONSE)?;
    decode_response(&message)
}

/// Same size limit as [`write_command`]
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_frame(writer, &encode_response(response), RESPONSE)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(tag);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

fn check_payload_len(payload_len: usize, what: &str) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(StoreError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn write_frame<W: Write>(writer: &mut W, message: &[u8], what: &str) -> Result<()> {
    check_payload_len(message.len() - HEADER_SIZE, what)?;
    writer.write_all(message)?;
    writer.flush()?;
    Ok(())
}

/// Validate a complete frame and return (tag, payload)
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u8();
    let payload_len = header.get_u32() as usize;
    check_payload_len(payload_len, what)?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = (&header[1..]).get_u32() as usize;
    check_payload_len(payload_len, what)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }

    Ok(message)
}

fn put_field(buf: &mut BytesMut, field: &str) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field.as_bytes());
}

fn get_field(buf: &mut &[u8], command: &str, field: &str) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(StoreError::Protocol(format!(
            "{} command: missing {} length",
            command, field
        )));
    }

    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(StoreError::Protocol(format!(
            "{} command: incomplete {} (expected {}, got {})",
            command,
            field,
            len,
            buf.remaining()
        )));
    }

    let slice: &[u8] = *buf;
    let (raw, rest) = slice.split_at(len);
    *buf = rest;

    String::from_utf8(raw.to_vec()).map_err(|_| {
        StoreError::Protocol(format!("{} command: {} is not valid UTF-8", command, field))
    })
}

fn get_value(buf: &mut &[u8], command: &str) -> Result<Value> {
    if buf.is_empty() {
        return Err(StoreError::Protocol(format!(
            "{} command: missing value",
            command
        )));
    }

    let value = serde_json::from_slice(*buf).map_err(|e| {
        StoreError::Protocol(format!("{} command: invalid JSON value: {}", command, e))
    })?;
    *buf = &[];

    Ok(value)
}

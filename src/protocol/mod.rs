//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: CREATE_SESSION - Payload: db
//! - 0x02: CLOSE_SESSION  - Payload: db
//! - 0x03: CREATE         - Payload: db + key + JSON value
//! - 0x04: READ           - Payload: db + key
//! - 0x05: UPDATE         - Payload: db + key + JSON value
//! - 0x06: DELETE         - Payload: db + key
//! - 0x07: PING           - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND   (missing key or session)
//! - 0x02: CONFLICT    (key already exists)
//! - 0x03: BAD_REQUEST (malformed command or database name)
//! - 0x04: ERROR       (I/O or serialization failure)

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_command_frame, read_response, write_command, write_response, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};

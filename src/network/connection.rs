//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::protocol::{decode_command, read_command_frame, write_response, Command, Response};
use crate::session::SessionManager;

/// Serves one client: read a frame, run it, answer, repeat
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,

    /// Shared session registry
    sessions: Arc<SessionManager>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Wrap an accepted stream; both halves share the socket
    pub fn new(stream: TcpStream, sessions: Arc<SessionManager>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            sessions,
            peer_addr,
        })
    }

    /// Apply socket timeouts; `None` leaves that direction blocking
    pub fn set_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(read)?;
        self.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }

    /// Serve requests until the peer goes away
    ///
    /// Disconnects and idle timeouts end the loop with `Ok`. A frame whose
    /// body does not decode gets a BAD_REQUEST reply and the loop continues;
    /// an oversized frame gets the reply and then the connection is closed.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let frame = match read_command_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(StoreError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected ({:?})", self.peer_addr, e.kind());
                    return Ok(());
                }
                Err(StoreError::Io(ref e)) if is_timeout(e.kind()) => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e @ StoreError::Protocol(_)) => {
                    // Oversized length: the payload was never read, so the
                    // next frame boundary is unknown. Reply and hang up.
                    tracing::warn!("Bad frame from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(Response::from_error(&e));
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(Response::from_error(&e));
                    return Err(e);
                }
            };

            // The whole frame was consumed, so a bad body only fails this request.
            let response = match decode_command(&frame) {
                Ok(command) => {
                    tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);
                    self.execute_command(command)
                }
                Err(e) => {
                    tracing::debug!("Bad command from {}: {}", self.peer_addr, e);
                    Response::from_error(&e)
                }
            };

            let sent = match self.send_response(response) {
                Err(e @ StoreError::Protocol(_)) => {
                    tracing::warn!("Response to {} not sent: {}", self.peer_addr, e);
                    self.send_response(Response::from_error(&e))
                }
                other => other,
            };

            if let Err(e) = sent {
                if let StoreError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    fn execute_command(&self, command: Command) -> Response {
        match self.sessions.execute(command) {
            Ok(Some(value)) => Response::value(&value),
            Ok(None) => Response::ok(None),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::debug!("Command from {} failed: {}", self.peer_addr, e);
                }
                Response::from_error(&e)
            }
        }
    }

    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}

/// Unix reports a read timeout as WouldBlock, Windows as TimedOut
fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::protocol::{encode_kv_pairs, read_command, write_response, Command, Response};
use crate::raw_api::{RawApi, RawDeleteRequest, RawGetRequest, RawPutRequest, RawScanRequest};
use crate::storage::{Context, Storage};

/// Handles a single client connection
pub struct Connection<S: Storage> {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    api: RawApi<S>,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: Storage> Connection<S> {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and disables Nagle's algorithm
    pub fn new(stream: TcpStream, api: RawApi<S>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            api,
            peer_addr,
        })
    }

    /// Configure connection timeouts; 0 means no timeout
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "connection established");

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(KvError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                // WouldBlock on unix, TimedOut on windows
                Err(KvError::Io(ref e))
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    tracing::debug!(peer = %self.peer_addr, "read timeout");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, "error reading command: {}", e);
                    let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!(peer = %self.peer_addr, "received {:?}", command.command_type());

            let response = self.execute_command(command);

            let written = match write_response(&mut self.writer, &response) {
                // nothing reached the socket; report instead of dropping the client
                Err(KvError::Protocol(msg)) => {
                    tracing::warn!(peer = %self.peer_addr, "response not sent: {}", msg);
                    write_response(&mut self.writer, &Response::error(&msg))
                }
                other => other,
            };

            if let Err(e) = written {
                if let KvError::Io(ref io_err) = e {
                    if is_disconnect(io_err) || io_err.kind() == io::ErrorKind::BrokenPipe {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            "client disconnected before response could be sent"
                        );
                        return Ok(());
                    }
                }
                tracing::warn!(peer = %self.peer_addr, "error writing response: {}", e);
                return Err(e);
            }
        }
    }

    /// Execute a command and return a response
    fn execute_command(&self, command: Command) -> Response {
        let context = Context::default();
        let result = match command {
            Command::RawGet { cf, key } => self
                .api
                .raw_get(RawGetRequest { context, cf, key })
                .map(|resp| {
                    if resp.not_found {
                        Response::not_found()
                    } else {
                        Response::ok(Some(resp.value))
                    }
                }),
            Command::RawPut { cf, key, value } => self
                .api
                .raw_put(RawPutRequest {
                    context,
                    cf,
                    key,
                    value,
                })
                .map(|()| Response::ok(None)),
            Command::RawDelete { cf, key } => self
                .api
                .raw_delete(RawDeleteRequest { context, cf, key })
                .map(|()| Response::ok(None)),
            Command::RawScan {
                cf,
                start_key,
                limit,
            } => self
                .api
                .raw_scan(RawScanRequest {
                    context,
                    cf,
                    start_key,
                    limit,
                })
                .map(|resp| Response::ok(Some(encode_kv_pairs(&resp.kvs)))),
            Command::Ping => Ok(Response::ok(Some(b"PONG".to_vec()))),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(peer = %self.peer_addr, "command failed: {}", e);
            Response::error(&e.to_string())
        })
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

//! Connection Handler Module
//!
//! This module runs one client session on a worker thread. The worker
//! stays inside [`ConnectionHandler::run`] until the session ends, then goes
//! back to the queue for the next connection.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Worker retrieves a Connection from the queue
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read frame              │─┼──> end of stream: session over
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │─┼──> exit00 / unknown verb: session over
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write response frame    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. Connection dropped (socket closed, registry entry removed)
//! ```
//!
//! I/O and framing errors end only this session. The storage engine is never
//! locked while the handler reads from or writes to the socket.

use crate::commands::{CloseReason, CommandHandler, Reply};
use crate::connection::registry::Connection;
use crate::protocol::{CommandError, FrameCodec, FrameError, HEADER_LEN};
use std::io::{BufReader, ErrorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Failed `accept` calls
    pub accept_errors: AtomicU64,
    /// Sessions currently being served by a worker
    pub active_sessions: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_ended(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// How a session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed the stream between frames
    ClientClosed,
    /// Client sent the end-of-session sentinel
    Exit,
    /// Client sent something that is not a valid command
    Rejected(CommandError),
}

/// Errors that end a session abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket configuration failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reading or writing a frame failed
    #[error("frame error: {0}")]
    FrameError(#[from] FrameError),
}

impl ConnectionError {
    /// True for errors caused by the peer going away abruptly.
    fn is_disconnect(&self) -> bool {
        let io_err = match self {
            ConnectionError::IoError(e) | ConnectionError::FrameError(FrameError::Io(e)) => e,
            ConnectionError::FrameError(
                FrameError::TruncatedHeader { .. } | FrameError::TruncatedPayload { .. },
            ) => return true,
            ConnectionError::FrameError(_) => return false,
        };
        matches!(
            io_err.kind(),
            ErrorKind::ConnectionReset | ErrorKind::BrokenPipe | ErrorKind::ConnectionAborted
        )
    }
}

/// Serves a single client connection.
pub struct ConnectionHandler {
    /// The connection being served
    connection: Connection,

    /// The command handler (shares the storage engine)
    command_handler: CommandHandler,

    /// Frame codec with the server's size limit
    codec: FrameCodec,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `connection` - The accepted connection, now owned by this worker
    /// * `command_handler` - The command handler for executing commands
    /// * `codec` - Frame codec carrying the payload size limit
    /// * `stats` - Shared connection statistics
    pub fn new(
        connection: Connection,
        command_handler: CommandHandler,
        codec: FrameCodec,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            connection,
            command_handler,
            codec,
            stats,
        }
    }

    /// Runs the session until it ends, then closes the connection.
    pub fn run(self) -> Result<SessionEnd, ConnectionError> {
        let addr = self.connection.peer_addr();
        debug!(client = %addr, "Session started");
        self.stats.session_started();

        let result = self.main_loop();

        match &result {
            Ok(SessionEnd::ClientClosed) => debug!(client = %addr, "Client disconnected"),
            Ok(SessionEnd::Exit) => debug!(client = %addr, "Client ended session"),
            Ok(SessionEnd::Rejected(e)) => {
                info!(client = %addr, reason = %e, "Closing session on invalid command")
            }
            Err(e) if e.is_disconnect() => debug!(client = %addr, error = %e, "Connection lost"),
            Err(e) => warn!(client = %addr, error = %e, "Connection error"),
        }

        self.stats.session_ended();
        result
    }

    /// The main read-execute-respond loop.
    fn main_loop(&self) -> Result<SessionEnd, ConnectionError> {
        let stream = self.connection.stream();
        stream.set_nodelay(true)?;

        let mut reader = BufReader::new(stream);
        let mut writer = stream;

        loop {
            let payload = match self.codec.read_frame(&mut reader)? {
                Some(payload) => payload,
                None => return Ok(SessionEnd::ClientClosed),
            };
            self.stats.bytes_read(HEADER_LEN + payload.len());

            let reply = self.command_handler.execute(&payload);
            self.stats.command_processed();

            match reply {
                Reply::Respond(response) => {
                    self.codec.write_frame(&mut writer, &response)?;
                    self.stats.bytes_written(HEADER_LEN + response.len());
                    trace!(
                        client = %self.connection.peer_addr(),
                        bytes = response.len(),
                        "Sent response"
                    );
                }
                Reply::Close(CloseReason::Exit) => return Ok(SessionEnd::Exit),
                Reply::Close(CloseReason::Rejected(e)) => return Ok(SessionEnd::Rejected(e)),
            }
        }
    }
}

/// Serves a connection to completion, logging rather than returning errors.
///
/// This is what each worker calls for every connection it retrieves.
pub fn handle_connection(
    connection: Connection,
    command_handler: CommandHandler,
    codec: FrameCodec,
    stats: Arc<ConnectionStats>,
) {
    let addr = connection.peer_addr();
    let handler = ConnectionHandler::new(connection, command_handler, codec, stats);
    if let Err(e) = handler.run() {
        trace!(client = %addr, error = %e, "Session ended with error");
    }
}

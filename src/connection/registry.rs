//! Open Connection Registry
//!
//! Tracks every accepted connection from the moment it is accepted until the
//! worker serving it drops it. The registry is what makes shutdown possible:
//! it can enumerate open connections and shut each one down, which unblocks
//! any worker sitting in a socket read.
//!
//! A [`Connection`] deregisters itself when dropped, so a connection that is
//! still queued, mid-session, or dropped after an I/O error is always
//! accounted for.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Identifier assigned to each accepted connection.
pub type ConnectionId = u64;

/// An accepted client connection.
///
/// Owned by exactly one party at a time: the acceptor, then the queue, then
/// the worker that serves it. Dropping it closes the socket.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
        trace!(client = %self.peer, id = self.id, "Connection closed");
    }
}

#[derive(Debug)]
struct Tracked {
    peer: SocketAddr,
    /// Second handle to the socket, used only for shutdown
    stream: TcpStream,
}

/// The set of currently open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    open: Mutex<HashMap<ConnectionId, Tracked>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Tracked>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `stream` and wraps it in a [`Connection`].
    pub fn register(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) -> io::Result<Connection> {
        let handle = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock().insert(
            id,
            Tracked {
                peer,
                stream: handle,
            },
        );

        Ok(Connection {
            id,
            stream,
            peer,
            registry: Arc::clone(self),
        })
    }

    fn deregister(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }

    /// Returns the number of open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lists the open connections.
    pub fn peers(&self) -> Vec<(ConnectionId, SocketAddr)> {
        let mut peers: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, tracked)| (*id, tracked.peer))
            .collect();
        peers.sort_unstable_by_key(|(id, _)| *id);
        peers
    }

    /// Shuts down both directions of every open connection.
    ///
    /// Blocked reads on those sockets return immediately, so the workers
    /// serving them end their sessions. Returns how many were shut down.
    pub fn close_all(&self) -> usize {
        let open = self.lock();
        for (id, tracked) in open.iter() {
            if let Err(e) = tracked.stream.shutdown(Shutdown::Both) {
                // Already closed by the peer; nothing left to do.
                trace!(client = %tracked.peer, id, error = %e, "Shutdown failed");
            } else {
                debug!(client = %tracked.peer, id, "Closed active client connection");
            }
        }
        open.len()
    }
}

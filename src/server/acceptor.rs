//! Acceptor thread: the single producer feeding the connection queue.

use crate::connection::{Connection, ConnectionRegistry, ConnectionStats};
use crate::queue::BoundedQueue;
use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept`, so a persistent error such as running out
/// of file descriptors does not spin the thread.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and enqueues them for the worker pool.
///
/// When the queue is full the acceptor blocks in `insert`, so new clients
/// wait in the listen backlog rather than being turned away.
pub struct Acceptor {
    listener: TcpListener,
    queue: Arc<BoundedQueue<Connection>>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ConnectionStats>,
    shutdown: Arc<AtomicBool>,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        queue: Arc<BoundedQueue<Connection>>,
        registry: Arc<ConnectionRegistry>,
        stats: Arc<ConnectionStats>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            listener,
            queue,
            registry,
            stats,
            shutdown,
        }
    }

    /// Runs the accept loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("acceptor".into())
            .spawn(move || self.run())
    }

    /// Main loop that accepts incoming connections.
    ///
    /// Returns once the shutdown flag is set (the server wakes the blocked
    /// `accept` with a loopback connection) or the queue has been closed.
    /// The listening socket is closed when this returns.
    pub fn run(self) {
        info!(
            addr = ?self.listener.local_addr().ok(),
            "Waiting for client connections"
        );

        loop {
            let accepted = self.listener.accept();

            if self.shutdown.load(Ordering::Acquire) {
                debug!("Acceptor woken for shutdown");
                break;
            }

            let (stream, addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    self.stats.accept_failed();
                    thread::sleep(ACCEPT_ERROR_BACKOFF);
                    continue;
                }
            };

            let connection = match self.registry.register(stream, addr) {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(client = %addr, error = %e, "Failed to register connection");
                    continue;
                }
            };
            self.stats.connection_accepted();
            debug!(client = %addr, queued = self.queue.len(), "New client connection");

            if let Err(closed) = self.queue.insert(connection) {
                debug!(client = %addr, "Queue closed, dropping connection");
                drop(closed.into_inner());
                break;
            }
        }

        info!("Acceptor stopped");
    }
}

//! Server Lifecycle
//!
//! Wires the pieces together: one acceptor thread, one bounded connection
//! queue, a fixed worker pool, the shared storage engine and the connection
//! registry.
//!
//! ```text
//!                 ┌───────────┐   insert   ┌──────────────┐  retrieve  ┌───────────┐
//!  clients ─────▶ │ Acceptor  │──────────▶ │ BoundedQueue │ ─────────▶ │ Worker 0  │──┐
//!                 └─────┬─────┘            └──────────────┘      ├────▶ │ Worker 1  │──┤
//!                       │ register                               └────▶ │ Worker N  │──┤
//!                       ▼                                               └───────────┘  │
//!               ┌────────────────────┐                       ┌────────────────────┐    │
//!               │ ConnectionRegistry │                       │   StorageEngine    │◀───┘
//!               └────────────────────┘                       └────────────────────┘
//! ```
//!
//! ## Shutdown
//!
//! [`ServerHandle::shutdown`] stops the acceptor (closing the listener),
//! closes the queue, drops connections still waiting in it, shuts down every
//! connection a worker is serving, and joins all threads.

pub mod acceptor;
pub mod worker;

pub use acceptor::Acceptor;
pub use worker::{Worker, WorkerPool};

use crate::commands::CommandHandler;
use crate::config::{ConfigError, ServerConfig};
use crate::connection::{Connection, ConnectionRegistry, ConnectionStats};
use crate::protocol::FrameCodec;
use crate::queue::BoundedQueue;
use crate::storage::StorageEngine;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Socket creation, bind or listen failed
    #[error("unable to bind to {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("unable to read listener address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("unable to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        source: io::Error,
    },
}

/// A bound, not yet running server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    storage: Arc<StorageEngine>,
}

impl Server {
    /// Validates `config` and binds the listening socket.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        info!(addr = %local_addr, "Server socket bound");

        Ok(Self {
            config,
            listener,
            local_addr,
            storage: Arc::new(StorageEngine::new()),
        })
    }

    /// Serves from an existing storage engine instead of a fresh one.
    pub fn with_storage(mut self, storage: Arc<StorageEngine>) -> Self {
        self.storage = storage;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the worker pool and the acceptor.
    pub fn start(self) -> Result<ServerHandle, ServerError> {
        let queue = Arc::new(BoundedQueue::new(self.config.queue_capacity));
        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(ConnectionStats::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = WorkerPool::spawn(
            self.config.workers,
            Arc::clone(&queue),
            CommandHandler::new(Arc::clone(&self.storage)),
            FrameCodec::new(self.config.max_frame_len),
            Arc::clone(&stats),
        )
        .map_err(|source| ServerError::Spawn {
            what: "worker",
            source,
        })?;
        info!(workers = workers.size(), "Worker pool started");

        let acceptor = Acceptor::new(
            self.listener,
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&stats),
            Arc::clone(&shutdown),
        );
        let acceptor = match acceptor.spawn() {
            Ok(handle) => handle,
            Err(source) => {
                queue.close();
                workers.join();
                return Err(ServerError::Spawn {
                    what: "acceptor",
                    source,
                });
            }
        };

        info!(
            addr = %self.local_addr,
            queue_capacity = self.config.queue_capacity,
            "Server started"
        );

        Ok(ServerHandle {
            local_addr: self.local_addr,
            shutdown,
            queue,
            registry,
            stats,
            storage: self.storage,
            acceptor,
            workers,
        })
    }
}

/// What [`ServerHandle::shutdown`] cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections still waiting in the queue, closed unserved
    pub pending_closed: usize,
    /// Connections shut down while a worker was serving them
    pub active_closed: usize,
}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    queue: Arc<BoundedQueue<Connection>>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ConnectionStats>,
    storage: Arc<StorageEngine>,
    acceptor: JoinHandle<()>,
    workers: WorkerPool,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// The open connections, for inspection or external cleanup.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Connections accepted but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stops the server and waits for every thread to exit.
    pub fn shutdown(self) -> ShutdownReport {
        info!("Shutting down server");

        self.shutdown.store(true, Ordering::Release);
        self.queue.close();
        wake_acceptor(self.local_addr);
        if self.acceptor.join().is_err() {
            error!("Acceptor thread panicked");
        }
        info!("Closed server socket");

        let pending_closed = self.queue.drain().len();
        let active_closed = self.registry.close_all();
        self.workers.join();

        let report = ShutdownReport {
            pending_closed,
            active_closed,
        };
        let storage = self.storage.stats();
        info!(
            pending_closed,
            active_closed,
            accepted = self.stats.connections_accepted.load(Ordering::Relaxed),
            commands = self.stats.commands_processed.load(Ordering::Relaxed),
            keys = storage.keys,
            "Server shutdown complete"
        );
        report
    }
}

/// Unblocks the acceptor's `accept` call with a throwaway connection.
fn wake_acceptor(addr: SocketAddr) {
    let target = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port())
        }
        _ => addr,
    };

    // Refused means the acceptor already left and closed the listener.
    if let Err(e) = TcpStream::connect(target) {
        debug!(error = %e, "Wake-up connection failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{RESPONSE_ENTRY_EXISTS, RESPONSE_NO_SUCH_ENTRY, RESPONSE_OK};
    use crate::protocol::{read_frame, write_frame, FrameError};
    use bytes::Bytes;
    use std::thread;
    use std::time::Duration;

    fn start_server(workers: usize, queue_capacity: usize) -> ServerHandle {
        let config = ServerConfig::new(0)
            .with_host("127.0.0.1")
            .with_workers(workers)
            .with_queue_capacity(queue_capacity);
        Server::bind(config).unwrap().start().unwrap()
    }

    fn request(client: &mut TcpStream, line: &[u8]) -> Bytes {
        write_frame(client, line).unwrap();
        read_frame(client).unwrap().unwrap()
    }

    #[test]
    fn test_end_to_end_session() {
        let server = start_server(2, 4);
        let mut client = TcpStream::connect(server.local_addr()).unwrap();

        assert_eq!(&request(&mut client, b"create 5 3 abc")[..], RESPONSE_OK);
        assert_eq!(&request(&mut client, b"read 5")[..], b"abc");
        assert_eq!(&request(&mut client, b"update 5 3 xyz")[..], RESPONSE_OK);
        assert_eq!(&request(&mut client, b"read 5")[..], b"xyz");
        assert_eq!(&request(&mut client, b"delete 5")[..], RESPONSE_OK);
        assert_eq!(&request(&mut client, b"read 5")[..], RESPONSE_NO_SUCH_ENTRY);

        write_frame(&mut client, b"exit00").unwrap();
        assert!(read_frame(&mut client).unwrap().is_none());

        let report = server.shutdown();
        assert_eq!(report, ShutdownReport::default());
    }

    #[test]
    fn test_store_is_shared_across_sessions() {
        let server = start_server(2, 4);

        let mut first = TcpStream::connect(server.local_addr()).unwrap();
        assert_eq!(&request(&mut first, b"create 1 9 two words")[..], RESPONSE_OK);
        write_frame(&mut first, b"exit00").unwrap();

        let mut second = TcpStream::connect(server.local_addr()).unwrap();
        assert_eq!(&request(&mut second, b"read 1")[..], b"two words");
        assert_eq!(
            &request(&mut second, b"create 1 5 other")[..],
            RESPONSE_ENTRY_EXISTS
        );
        drop(second);

        server.shutdown();
    }

    #[test]
    fn test_concurrent_clients_update_same_key() {
        let server = start_server(4, 16);
        let addr = server.local_addr();

        let mut seed = TcpStream::connect(addr).unwrap();
        assert_eq!(&request(&mut seed, b"create 7 4 seed")[..], RESPONSE_OK);
        write_frame(&mut seed, b"exit00").unwrap();

        let clients: Vec<_> = (0..4)
            .map(|i| {
                thread::spawn(move || {
                    let mut client = TcpStream::connect(addr).unwrap();
                    let line = format!("update 7 8 client-{i}");
                    for _ in 0..50 {
                        assert_eq!(&request(&mut client, line.as_bytes())[..], RESPONSE_OK);
                    }
                    write_frame(&mut client, b"exit00").unwrap();
                })
            })
            .collect();
        for client in clients {
            client.join().unwrap();
        }

        let value = server.storage().read(7).unwrap();
        let candidates: Vec<String> = (0..4).map(|i| format!("client-{i}")).collect();
        assert!(candidates.iter().any(|c| c.as_bytes() == &value[..]));

        server.shutdown();
    }

    #[test]
    fn test_waiting_connection_served_after_worker_frees() {
        let server = start_server(1, 2);

        let mut first = TcpStream::connect(server.local_addr()).unwrap();
        assert_eq!(&request(&mut first, b"create 1 1 a")[..], RESPONSE_OK);

        // The only worker is busy with `first`, so `second` waits in the queue.
        let mut second = TcpStream::connect(server.local_addr()).unwrap();
        second
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        write_frame(&mut second, b"read 1").unwrap();
        assert!(matches!(read_frame(&mut second), Err(FrameError::Io(_))));
        assert_eq!(server.pending(), 1);

        write_frame(&mut first, b"exit00").unwrap();

        second.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(&read_frame(&mut second).unwrap().unwrap()[..], b"a");

        server.shutdown();
    }

    #[test]
    fn test_shutdown_closes_open_connections() {
        let server = start_server(1, 4);

        let mut active = TcpStream::connect(server.local_addr()).unwrap();
        assert_eq!(&request(&mut active, b"create 1 1 a")[..], RESPONSE_OK);
        let mut queued = TcpStream::connect(server.local_addr()).unwrap();

        // Give the acceptor time to queue the second connection.
        for _ in 0..50 {
            if server.pending() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(server.registry().len(), 2);

        let report = server.shutdown();
        assert_eq!(
            report,
            ShutdownReport {
                pending_closed: 1,
                active_closed: 1
            }
        );

        assert!(read_frame(&mut active).unwrap().is_none());
        assert!(read_frame(&mut queued).unwrap().is_none());
    }

    #[test]
    fn test_shutdown_with_acceptor_blocked_on_full_queue() {
        let server = start_server(1, 1);
        let addr = server.local_addr();

        let mut active = TcpStream::connect(addr).unwrap();
        assert_eq!(&request(&mut active, b"create 1 1 a")[..], RESPONSE_OK);

        // Second fills the queue, third leaves the acceptor waiting in
        // insert, fourth stays in the listen backlog.
        let _clients: Vec<TcpStream> = (0..3)
            .map(|_| TcpStream::connect(addr).unwrap())
            .collect();
        for _ in 0..100 {
            if server.registry().len() == 3 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(server.registry().len(), 3);
        assert_eq!(server.pending(), 1);

        let report = server.shutdown();
        assert_eq!(
            report,
            ShutdownReport {
                pending_closed: 1,
                active_closed: 1
            }
        );

        // The listening socket is gone.
        assert!(TcpStream::connect(addr).is_err());
        assert!(read_frame(&mut active).unwrap().is_none());
    }

    #[test]
    fn test_serves_existing_storage() {
        let storage = Arc::new(StorageEngine::new());
        storage.create(42, Bytes::from("preloaded")).unwrap();

        let config = ServerConfig::new(0).with_host("127.0.0.1").with_workers(1);
        let server = Server::bind(config)
            .unwrap()
            .with_storage(Arc::clone(&storage))
            .start()
            .unwrap();

        let mut client = TcpStream::connect(server.local_addr()).unwrap();
        assert_eq!(&request(&mut client, b"read 42")[..], b"preloaded");
        assert_eq!(&request(&mut client, b"create 43 3 new")[..], RESPONSE_OK);
        write_frame(&mut client, b"exit00").unwrap();
        assert!(read_frame(&mut client).unwrap().is_none());

        server.shutdown();
        assert_eq!(storage.read(43), Ok(Bytes::from("new")));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ServerConfig::new(0).with_host("127.0.0.1").with_workers(0);
        assert!(matches!(
            Server::bind(config),
            Err(ServerError::Config(ConfigError::ZeroWorkers))
        ));
    }

    #[test]
    fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = ServerConfig::new(port).with_host("127.0.0.1");
        assert!(matches!(
            Server::bind(config),
            Err(ServerError::Bind { .. })
        ));
    }
}

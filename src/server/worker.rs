//! Fixed-size pool of worker threads draining the connection queue.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, Connection, ConnectionStats};
use crate::protocol::FrameCodec;
use crate::queue::BoundedQueue;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info_span};

/// One consumer: retrieves a connection, serves it, repeats.
pub struct Worker {
    id: usize,
    queue: Arc<BoundedQueue<Connection>>,
    command_handler: CommandHandler,
    codec: FrameCodec,
    stats: Arc<ConnectionStats>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<BoundedQueue<Connection>>,
        command_handler: CommandHandler,
        codec: FrameCodec,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            id,
            queue,
            command_handler,
            codec,
            stats,
        }
    }

    /// Serves connections until the queue is closed and empty.
    pub fn run(self) {
        let _span = info_span!("worker", id = self.id).entered();
        debug!("Worker started");

        while let Some(connection) = self.queue.retrieve() {
            handle_connection(
                connection,
                self.command_handler.clone(),
                self.codec,
                Arc::clone(&self.stats),
            );
        }

        debug!("Worker stopped");
    }
}

/// The worker threads, fixed in number for the life of the server.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers sharing `queue`.
    ///
    /// If any thread fails to spawn, the queue is closed, the workers already
    /// running are joined, and the error is returned.
    pub fn spawn(
        size: usize,
        queue: Arc<BoundedQueue<Connection>>,
        command_handler: CommandHandler,
        codec: FrameCodec,
        stats: Arc<ConnectionStats>,
    ) -> io::Result<Self> {
        let mut pool = Self {
            handles: Vec::with_capacity(size),
        };

        for id in 0..size {
            let worker = Worker::new(
                id,
                Arc::clone(&queue),
                command_handler.clone(),
                codec,
                Arc::clone(&stats),
            );

            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    queue.close();
                    pool.join();
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to exit.
    ///
    /// Workers exit only after the queue is closed and drained.
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "Worker thread panicked");
            }
        }
    }
}

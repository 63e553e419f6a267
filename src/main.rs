//! PoolKV - A Thread-Pool In-Memory Key-Value Server
//!
//! This is the main entry point for the PoolKV server.
//! It parses the port, starts the acceptor and worker threads, and waits for
//! a termination signal.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use poolkv::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use poolkv::{Server, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// In-memory key-value server.
#[derive(Parser, Debug)]
#[command(name = "poolkv", version, about)]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// Number of worker threads
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Connections that may wait for a free worker
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::new(args.port)
        .with_workers(args.workers)
        .with_queue_capacity(args.queue_capacity);

    let server = Server::bind(config.clone())
        .with_context(|| format!("unable to bind to port {}", config.port))?;
    let handle = server.start().context("unable to start server")?;

    info!(
        "PoolKV v{} listening on {} with {} workers",
        poolkv::VERSION,
        handle.local_addr(),
        config.workers
    );

    shutdown_signal().await;
    info!("Shutdown signal received, stopping server...");

    // Joining threads blocks, keep it off the async runtime.
    let report = tokio::task::spawn_blocking(move || handle.shutdown())
        .await
        .context("shutdown task failed")?;
    info!(
        pending = report.pending_closed,
        active = report.active_closed,
        "Server stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

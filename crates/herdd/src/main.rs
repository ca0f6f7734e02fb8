//! Herd daemon - UDP fan-out server
//!
//! Listens for client heartbeats on a UDP socket and fans out commands
//! read from an upstream event feed to every client still considered
//! live.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (127.0.0.1:5000, 10s liveness window)
//! herdd
//!
//! # Custom listen address and window
//! herdd --listen 0.0.0.0:5000 --ttl-secs 30
//!
//! # Environment overrides
//! HERD_LISTEN=0.0.0.0:5000 herdd
//!
//! # Enable debug logging
//! RUST_LOG=herdd=debug herdd
//! ```
//!
//! Events arrive as newline-delimited JSON on stdin
//! (`{"status": 144, "data1": 60, "data2": 127}`); each is stamped with a
//! delivery deadline and broadcast to the live set.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use herd_protocol::HerdCommand;
use herdd::config::Config;
use herdd::pool::ClientPool;

/// How far in the future, in milliseconds, each command's deadline lies.
const MESSAGE_DEADLINE_MS: i64 = 100;

/// Herd daemon - heartbeat-tracked UDP fan-out
#[derive(Parser, Debug)]
#[command(name = "herdd", version, about)]
struct Args {
    /// Address to listen on for client heartbeats (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Liveness window in seconds
    #[arg(long)]
    ttl_secs: Option<i64>,

    /// Receive buffer size in bytes
    #[arg(long)]
    recv_buffer: Option<usize>,
}

/// One upstream event, read from stdin as a JSON line.
#[derive(Debug, Deserialize)]
struct FeedEvent {
    status: i64,
    #[serde(default)]
    data1: i64,
    #[serde(default)]
    data2: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("herdd=info".parse()?)
                .add_directive("herd_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::resolve(args.listen, args.ttl_secs, args.recv_buffer);

    info!(version = env!("CARGO_PKG_VERSION"), "herd daemon starting");

    let pool = ClientPool::bind(&config)
        .await
        .context("failed to start client pool")?;
    let mut listener_done = pool.listen();

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        info!("shutdown signal received");
        shutdown_token.cancel();
    });

    let start = Instant::now();
    let mut feed = BufReader::new(tokio::io::stdin()).lines();
    let mut feed_open = true;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                break;
            }

            received = &mut listener_done => {
                match received {
                    Ok(e) => return Err(e).context("heartbeat listener failed"),
                    // Sender dropped without an error: the listener task
                    // ended some other way; treat it as shutdown.
                    Err(_) => break,
                }
            }

            line = feed.next_line(), if feed_open => {
                match line.context("failed to read event feed")? {
                    Some(line) => handle_event_line(&pool, &line, start).await?,
                    None => {
                        info!("event feed closed, still serving heartbeats");
                        feed_open = false;
                    }
                }
            }
        }
    }

    info!("herd daemon stopped");
    Ok(())
}

/// Parses one feed line and broadcasts it.
///
/// Malformed lines are logged and skipped; a failed broadcast is fatal.
async fn handle_event_line(pool: &ClientPool, line: &str, start: Instant) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let event: FeedEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "skipping malformed event line");
            return Ok(());
        }
    };

    let elapsed_ms = start.elapsed().as_millis() as i64;
    let command = HerdCommand::new(
        event.status,
        event.data1,
        event.data2,
        elapsed_ms + MESSAGE_DEADLINE_MS,
    );

    pool.send(&command).await.context("broadcast failed")
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}

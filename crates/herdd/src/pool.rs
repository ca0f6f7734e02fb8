//! The client pool: one UDP socket, one registry, one broadcaster.
//!
//! `ClientPool` owns the daemon's shared state. The socket and registry
//! are handed out as cheap `Arc` clones, so the heartbeat listener and the
//! broadcast path work against the same instances without any hidden
//! process-wide globals; tests construct isolated pools the same way.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use herd_core::{ClientRegistry, EndpointId, EndpointParseError};
use herd_protocol::{CodecError, HerdCommand};

use crate::config::Config;
use crate::listener::spawn_heartbeat_listener;

/// Shared socket plus the live-client registry.
pub struct ClientPool {
    /// Socket shared between the listener (reads) and broadcasts (writes).
    socket: Arc<UdpSocket>,

    /// All registry access goes through this single lock.
    registry: Arc<Mutex<ClientRegistry>>,

    /// Receive buffer size handed to the listener.
    recv_buffer: usize,
}

impl ClientPool {
    /// Binds the UDP socket and creates an empty registry.
    ///
    /// A bind or address-parse failure is returned here and no pool is
    /// created.
    pub async fn bind(config: &Config) -> Result<Self, PoolError> {
        let addr: EndpointId = config.listen_addr.parse()?;
        let socket = UdpSocket::bind(addr.socket_addr())
            .await
            .map_err(|source| PoolError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;

        info!(addr = %config.listen_addr, ttl_secs = config.liveness_window_secs, "listening");

        Ok(Self {
            socket: Arc::new(socket),
            registry: Arc::new(Mutex::new(ClientRegistry::with_window(
                config.liveness_window_secs,
            ))),
            recv_buffer: config.recv_buffer,
        })
    }

    /// Returns the locally bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Returns a handle to the registry.
    pub fn registry(&self) -> Arc<Mutex<ClientRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Spawns the heartbeat listener task.
    ///
    /// The returned receiver fires at most once, carrying the fatal
    /// receive error that terminated the loop.
    pub fn listen(&self) -> oneshot::Receiver<io::Error> {
        spawn_heartbeat_listener(
            Arc::clone(&self.socket),
            Arc::clone(&self.registry),
            self.recv_buffer,
        )
    }

    /// Broadcasts a command to all live clients.
    ///
    /// One registry pass selects the live set and evicts stale records;
    /// the datagrams are then written sequentially, and the first
    /// transport error aborts the remaining sends for this call. Clients
    /// already sent to are not rolled back, and evictions stand even if a
    /// later send fails. Zero live clients is success.
    pub async fn send(&self, command: &HerdCommand) -> Result<(), PoolError> {
        let wire = command.encode()?;
        let now = Utc::now().timestamp();

        // Liveness decisions and eviction run under the lock; the UDP
        // writes run after it is released, so a slow send cannot stall
        // heartbeat processing.
        let live = {
            let mut registry = self.registry.lock().await;
            registry.collect_live(now)
        };

        for endpoint in live {
            self.socket
                .send_to(&wire, endpoint.socket_addr())
                .await
                .map_err(|source| PoolError::Send { endpoint, source })?;
            debug!(%endpoint, status = command.status, "packet written");
        }

        Ok(())
    }
}

/// Errors from pool construction and broadcasting.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error(transparent)]
    ListenAddr(#[from] EndpointParseError),

    #[error("failed to bind UDP socket at {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to send to {endpoint}: {source}")]
    Send {
        endpoint: EndpointId,
        source: io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            listen_addr: "127.0.0.1:0".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_bind_assigns_local_addr() {
        let pool = ClientPool::bind(&test_config()).await.unwrap();
        let addr = pool.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let config = Config {
            listen_addr: "not-an-address".to_string(),
            ..Config::default()
        };
        let result = ClientPool::bind(&config).await;
        assert!(matches!(result, Err(PoolError::ListenAddr(_))));
    }

    #[tokio::test]
    async fn test_send_with_no_clients_succeeds() {
        let pool = ClientPool::bind(&test_config()).await.unwrap();
        let command = HerdCommand::new(1, 2, 3, 4);
        pool.send(&command).await.unwrap();
    }
}

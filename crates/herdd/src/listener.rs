//! The heartbeat receive loop.
//!
//! One long-running task turns inbound datagrams into registry mutations.
//! The registry lock is held for the whole classify-then-mutate decision,
//! so a disconnect can never race a concurrent broadcast into
//! re-registering the sender from the same datagram.

use std::io;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, trace};

use herd_core::{ClientRegistry, EndpointId};
use herd_protocol::{classify, Inbound};

/// Spawns the heartbeat listener task.
///
/// The loop blocks on `recv_from` with no per-receive timeout and no
/// retries. Each datagram is classified on the bytes actually received:
/// a disconnect removes the sender (and never touches it afterwards),
/// anything else refreshes it.
///
/// On a fatal receive error the loop reports the error exactly once
/// through the returned single-slot channel and exits, dropping its
/// socket handle.
pub fn spawn_heartbeat_listener(
    socket: Arc<UdpSocket>,
    registry: Arc<Mutex<ClientRegistry>>,
    recv_buffer: usize,
) -> oneshot::Receiver<io::Error> {
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut buf = vec![0u8; recv_buffer];

        loop {
            let (len, addr) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "heartbeat listener terminating");
                    // The daemon may already be shutting down and have
                    // dropped the receiver; nothing more to report then.
                    let _ = done_tx.send(e);
                    return;
                }
            };

            let endpoint = EndpointId::new(addr);
            let now = Utc::now().timestamp();

            let mut registry = registry.lock().await;
            match classify(&buf[..len]) {
                Inbound::Disconnect => {
                    if registry.remove(&endpoint) {
                        debug!(%endpoint, "client said bye");
                    }
                }
                Inbound::Heartbeat => {
                    registry.touch(endpoint, now);
                    trace!(%endpoint, len, "heartbeat");
                }
            }
        }
    });

    done_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_protocol::HerdCommand;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn bind_pair() -> (Arc<UdpSocket>, Arc<Mutex<ClientRegistry>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (Arc::new(socket), Arc::new(Mutex::new(ClientRegistry::new())))
    }

    /// Polls the registry until `predicate` holds or the deadline passes.
    async fn wait_for<F>(registry: &Arc<Mutex<ClientRegistry>>, predicate: F)
    where
        F: Fn(&ClientRegistry) -> bool,
    {
        let deadline = Duration::from_secs(2);
        let check = async {
            loop {
                if predicate(&*registry.lock().await) {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(deadline, check)
            .await
            .expect("registry did not reach expected state in time");
    }

    #[tokio::test]
    async fn test_heartbeat_registers_sender() {
        let (socket, registry) = bind_pair().await;
        let server_addr = socket.local_addr().unwrap();
        let _done = spawn_heartbeat_listener(Arc::clone(&socket), Arc::clone(&registry), 1024);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hi", server_addr).await.unwrap();

        wait_for(&registry, |r| r.len() == 1).await;
        let expected = EndpointId::new(client.local_addr().unwrap());
        assert!(registry.lock().await.contains(&expected));
    }

    #[tokio::test]
    async fn test_bye_removes_sender() {
        let (socket, registry) = bind_pair().await;
        let server_addr = socket.local_addr().unwrap();
        let _done = spawn_heartbeat_listener(Arc::clone(&socket), Arc::clone(&registry), 1024);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hi", server_addr).await.unwrap();
        wait_for(&registry, |r| r.len() == 1).await;

        client.send_to(b"bye", server_addr).await.unwrap();
        wait_for(&registry, |r| r.is_empty()).await;
    }

    #[tokio::test]
    async fn test_bye_from_unknown_sender_is_noop() {
        let (socket, registry) = bind_pair().await;
        let server_addr = socket.local_addr().unwrap();
        let _done = spawn_heartbeat_listener(Arc::clone(&socket), Arc::clone(&registry), 1024);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"bye", server_addr).await.unwrap();

        // Give the listener a moment; the registry must stay empty.
        sleep(Duration::from_millis(50)).await;
        assert!(registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_command_payload_is_just_a_heartbeat() {
        let (socket, registry) = bind_pair().await;
        let server_addr = socket.local_addr().unwrap();
        let _done = spawn_heartbeat_listener(Arc::clone(&socket), Arc::clone(&registry), 1024);

        // Even a well-formed command datagram only refreshes liveness.
        let wire = HerdCommand::new(1, 2, 3, 4).encode().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&wire, server_addr).await.unwrap();

        wait_for(&registry, |r| r.len() == 1).await;
    }
}

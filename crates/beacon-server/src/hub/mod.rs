//! The connection hub: registry of live WebSocket clients, the broadcaster
//! that fans queued payloads out to all of them, and the per-connection
//! socket tasks.

pub mod broadcaster;
pub mod connection;
pub mod registry;
pub mod socket;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use beacon_core::{ConnectionId, OutboundMessage};

use self::registry::ConnectionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Two live connections claimed the same identity. Identities are unique
    /// per accept, so this is a bug upstream, not a runtime condition.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// The broadcast queue is gone; the hub is shutting down.
    #[error("broadcast queue closed")]
    QueueClosed,
}

/// Tunables for the hub.
#[derive(Clone, Debug)]
pub struct HubConfig {
    pub broadcast_capacity: usize,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 1024,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

/// Owns the registry, the inbound queue, and the broadcaster task.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    sender: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
    config: HubConfig,
}

impl Hub {
    /// Start the hub: allocates the queue and spawns the broadcaster.
    /// Cancelling `cancel` stops the broadcaster and every connection task.
    pub fn start(config: HubConfig, cancel: CancellationToken) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.broadcast_capacity);
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = tokio::spawn(broadcaster::run(
            receiver,
            registry.clone(),
            cancel.clone(),
        ));

        let hub = Arc::new(Self {
            registry,
            sender,
            cancel,
            config,
        });
        (hub, broadcaster)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Producer handle for the inbound queue. Any task may clone and keep one.
    pub fn sender(&self) -> mpsc::Sender<OutboundMessage> {
        self.sender.clone()
    }

    /// Enqueue a message for fan-out. Suspends while the queue is full.
    pub async fn broadcast(&self, message: OutboundMessage) -> Result<(), HubError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| HubError::QueueClosed)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Child token for one connection: cancelling it closes that connection
    /// alone, while a hub-level cancel propagates to all of them.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

#[cfg(test)]
impl Hub {
    fn test_connection(
        &self,
    ) -> (
        Arc<connection::ClientConnection>,
        mpsc::Receiver<bytes::Bytes>,
    ) {
        let (tx, rx) = mpsc::channel(self.config.max_send_queue);
        let conn = Arc::new(connection::ClientConnection::new(
            ConnectionId::new(),
            tx,
            self.child_token(),
        ));
        (conn, rx)
    }
}

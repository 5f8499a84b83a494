//! State for one connected WebSocket client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use beacon_core::ConnectionId;

/// A connected client.
///
/// Reads are owned by the connection's reader task; outbound traffic flows
/// through `tx` and is written to the socket by the single writer task, so a
/// connection can never have two concurrent writers.
pub struct ClientConnection {
    id: ConnectionId,
    /// Send queue drained by the writer task.
    tx: mpsc::Sender<Bytes>,
    /// Cancelling this closes the connection: both loops observe it and exit.
    cancel: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client responded since the last heartbeat check.
    is_alive: AtomicBool,
    /// When the last pong (or any inbound activity) was seen.
    last_pong: Mutex<Instant>,
}

impl ClientConnection {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            cancel,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Enqueue a payload for this client.
    ///
    /// Returns `false` when the queue is full or the writer is gone; either
    /// way the write did not happen and the caller treats the connection as
    /// failed.
    pub fn send(&self, payload: Bytes) -> bool {
        self.tx.try_send(payload).is_ok()
    }

    /// Signal the connection to close. Idempotent; unblocks any pending
    /// read or write immediately.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection has been told to close.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Record a pong (or other inbound activity).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag for the heartbeat tick.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

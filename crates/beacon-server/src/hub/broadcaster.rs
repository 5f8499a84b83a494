//! Fan-out of queued payloads to every live connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::OutboundMessage;

use super::registry::ConnectionRegistry;

/// Single consumer of the inbound queue. Dequeues one message at a time and
/// delivers it to a snapshot of the registry; runs until the queue closes or
/// the hub is cancelled.
pub(crate) async fn run(
    mut rx: mpsc::Receiver<OutboundMessage>,
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
) {
    info!("broadcaster started");
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => {
                    let _ = deliver(&registry, &message);
                }
                None => break,
            },
            () = cancel.cancelled() => break,
        }
    }
    info!("broadcaster stopped");
}

/// Deliver one message to every member of a registry snapshot.
///
/// Delivery to each member is independent: a failed send evicts exactly that
/// connection and closes its transport, and the loop carries on with the
/// rest. Returns how many members accepted the payload.
pub(crate) fn deliver(registry: &ConnectionRegistry, message: &OutboundMessage) -> usize {
    let members = registry.snapshot();
    let mut delivered = 0;
    for conn in &members {
        if conn.send(message.payload.clone()) {
            delivered += 1;
        } else {
            warn!(conn_id = %conn.id(), "write failed, evicting connection");
            let _ = registry.remove(conn.id());
            conn.close();
        }
    }
    debug!(
        recipients = delivered,
        members = members.len(),
        bytes = message.len(),
        "broadcast delivered"
    );
    delivered
}

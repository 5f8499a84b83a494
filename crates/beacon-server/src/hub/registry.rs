//! The authoritative set of live connections.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use beacon_core::ConnectionId;

use super::connection::ClientConnection;
use super::HubError;

/// Live connections keyed by connection id.
///
/// Every operation serializes through one mutex and does nothing but map
/// work inside it, so the acceptor, the broadcaster, and any number of
/// socket tasks can mutate concurrently without ever observing a torn set.
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a connection. A duplicate id is refused: accept produces a
    /// fresh id per socket, so a collision means something upstream broke.
    pub fn add(&self, conn: Arc<ClientConnection>) -> Result<(), HubError> {
        let mut inner = self.inner.lock();
        match inner.entry(conn.id().clone()) {
            Entry::Occupied(_) => Err(HubError::AlreadyRegistered(conn.id().clone())),
            Entry::Vacant(slot) => {
                let _ = slot.insert(conn);
                Ok(())
            }
        }
    }

    /// Remove a connection. Idempotent: a failed write and a failed read may
    /// both report the same disconnect, and the second report is a no-op.
    /// Returns whether the connection was present.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        self.inner.lock().remove(id).is_some()
    }

    /// Point-in-time copy of the member set. Broadcast iteration runs over
    /// this copy, never over the live map.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.inner.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

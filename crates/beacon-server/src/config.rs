//! Server configuration and the pluggable origin policy.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::hub::HubConfig;

/// Configuration for the beacon server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `4000`; `0` auto-assigns).
    pub port: u16,
    /// Capacity of the shared broadcast queue.
    pub broadcast_capacity: usize,
    /// Per-connection outbound queue size. A connection that falls this far
    /// behind is evicted.
    pub max_send_queue: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4000,
            broadcast_capacity: 1024,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl ServerConfig {
    pub fn hub(&self) -> HubConfig {
        HubConfig {
            broadcast_capacity: self.broadcast_capacity,
            max_send_queue: self.max_send_queue,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}

/// Predicate deciding whether an upgrade request's origin is acceptable.
pub type OriginPolicy = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Accept every origin (the default).
pub fn allow_all_origins() -> OriginPolicy {
    Arc::new(|_| true)
}

/// Accept only the listed origins. Requests without an `Origin` header
/// (non-browser clients) are allowed through.
pub fn allow_origins(allowed: impl IntoIterator<Item = String>) -> OriginPolicy {
    let allowed: HashSet<String> = allowed.into_iter().collect();
    Arc::new(move |headers| match headers.get(header::ORIGIN) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|origin| allowed.contains(origin))
            .unwrap_or(false),
    })
}

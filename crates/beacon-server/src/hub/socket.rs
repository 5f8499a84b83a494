//! WebSocket upgrade handling and the per-connection socket tasks.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use beacon_core::{ConnectionId, Principal};

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::server::AppState;

use super::connection::ClientConnection;
use super::Hub;

/// GET /v1/ws
///
/// Only authenticated requests get this far (the extractor rejects the
/// rest), then the origin policy decides whether to upgrade. A rejected
/// request registers nothing and spawns nothing.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Authenticated(principal): Authenticated,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if !(state.origin_policy)(&headers) {
        warn!(user_id = principal.user_id, "upgrade rejected: origin not allowed");
        return ApiError::Forbidden("origin not allowed".into()).into_response();
    }

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| accept(socket, principal, hub))
}

/// Register an upgraded socket and run it to completion.
pub(crate) async fn accept(socket: WebSocket, principal: Principal, hub: Arc<Hub>) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::channel(hub.config().max_send_queue);
    let conn = Arc::new(ClientConnection::new(id.clone(), tx, hub.child_token()));

    if let Err(e) = hub.registry().add(conn.clone()) {
        // Ids are fresh per accept; a collision is a bug, not load.
        error!(conn_id = %id, error = %e, "registry invariant violated, refusing connection");
        return;
    }

    info!(conn_id = %id, user_id = principal.user_id, "client connected");
    run_socket(socket, conn, rx, hub).await;
}

/// Drive one connection: a writer task draining the send queue (plus
/// heartbeat pings) and a reader task watching for inbound frames. When
/// either side finishes, the connection is removed from the registry and its
/// close signal fired; both steps are idempotent, so a concurrent eviction
/// by the broadcaster is harmless.
async fn run_socket(
    socket: WebSocket,
    conn: Arc<ClientConnection>,
    rx: mpsc::Receiver<Bytes>,
    hub: Arc<Hub>,
) {
    let (ws_tx, ws_rx) = socket.split();
    let interval = hub.config().heartbeat_interval;
    let timeout = hub.config().heartbeat_timeout;

    let writer = tokio::spawn(write_loop(ws_tx, rx, conn.clone(), interval, timeout));
    let reader = tokio::spawn(read_loop(ws_rx, conn.clone()));

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    let _ = hub.registry().remove(conn.id());
    conn.close();
    info!(conn_id = %conn.id(), age_secs = conn.age().as_secs(), "client disconnected");
}

/// Forward queued payloads to the socket and ping on an interval. Exits on
/// write failure, queue closure, an unresponsive peer, or the close signal.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
    conn: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
) {
    let mut ping = tokio::time::interval(interval);
    ping.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            payload = rx.recv() => match payload {
                Some(payload) => {
                    if ws_tx.send(Message::Binary(payload)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if !conn.check_alive() && conn.last_pong_elapsed() > timeout {
                    warn!(conn_id = %conn.id(), "client unresponsive, closing");
                    break;
                }
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            () = conn.closed() => break,
        }
    }

    // Best-effort close frame; the peer may already be gone.
    let _ = ws_tx.send(Message::Close(None)).await;
}

/// Block on inbound frames. Any read error or close frame is terminal for
/// this connection; inbound payloads are opaque on a server-to-client
/// channel, so they only refresh liveness.
async fn read_loop(mut ws_rx: SplitStream<WebSocket>, conn: Arc<ClientConnection>) {
    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => conn.mark_alive(),
                Some(Ok(Message::Close(_))) => {
                    debug!(conn_id = %conn.id(), "client sent close frame");
                    break;
                }
                Some(Ok(_)) => conn.mark_alive(),
                Some(Err(e)) => {
                    debug!(conn_id = %conn.id(), error = %e, "read failed");
                    break;
                }
                None => break,
            },
            () = conn.closed() => break,
        }
    }
}

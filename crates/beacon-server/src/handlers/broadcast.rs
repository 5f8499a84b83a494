//! POST /v1/broadcast — enqueue a payload for fan-out.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::debug;

use beacon_core::OutboundMessage;

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::server::AppState;

/// Accepts an opaque body and hands it to the hub queue. 202 means queued,
/// not delivered; delivery is the broadcaster's business.
pub async fn enqueue(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body must not be empty".into()));
    }

    debug!(
        user_id = principal.user_id,
        bytes = body.len(),
        "broadcast enqueued"
    );
    state.hub.broadcast(OutboundMessage::new(body)).await?;
    Ok(StatusCode::ACCEPTED)
}

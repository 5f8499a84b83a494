//! Payloads queued for fan-out to every live connection.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One opaque payload to broadcast, stamped at enqueue time.
///
/// The hub never inspects the payload; producers decide the wire format.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    pub payload: Bytes,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

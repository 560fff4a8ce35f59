use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::order::{Order, OrderStatus};

// ============================================================================
// Order Event Envelope - the unit exchanged over the broker
// ============================================================================
//
// Carries a full order snapshot, never a delta, so a single message is enough
// to update any view. Every other field is derivable from `order`; `orderId`
// and `status` exist so consumers can pre-filter cheaply.
//
// Wire form (UTF-8 JSON):
//   { "type": "create" | "update" | "assign-captain",
//     "orderId": "...", "status": "PREPARING", "user": "...",
//     "time": "2024-05-01T08:00:00Z", "order": { ... } }
//
// ============================================================================

/// Operation that caused the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "assign-captain")]
    AssignCaptain,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::AssignCaptain => "assign-captain",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Payload is not a valid order event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Envelope orderId {envelope} does not match snapshot id {snapshot}")]
    OrderIdMismatch { envelope: String, snapshot: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub order_id: String,
    pub status: OrderStatus,
    /// Customer display name; advisory.
    #[serde(default)]
    pub user: Option<String>,
    /// Publish time; advisory, never used for ordering.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub order: Order,
}

impl OrderEventEnvelope {
    /// Build the envelope for a committed order, deriving every field
    /// from the snapshot.
    pub fn for_order(order: &Order, event_type: EventType) -> Self {
        Self {
            event_type,
            order_id: order.id.clone(),
            status: order.status,
            user: order.customer_name().map(str::to_string),
            time: Some(Utc::now()),
            order: order.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a raw broker payload.
    ///
    /// The snapshot is ground truth: an `orderId` that disagrees with it
    /// makes the envelope malformed, a stale `status` is overwritten.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw)?;
        let mut envelope: OrderEventEnvelope = serde_json::from_str(text)?;

        if envelope.order_id != envelope.order.id {
            return Err(DecodeError::OrderIdMismatch {
                envelope: envelope.order_id,
                snapshot: envelope.order.id,
            });
        }

        if envelope.status != envelope.order.status {
            tracing::warn!(
                order_id = %envelope.order_id,
                envelope_status = %envelope.status,
                snapshot_status = %envelope.order.status,
                "Envelope status disagrees with snapshot, using snapshot"
            );
            envelope.status = envelope.order.status;
        }

        Ok(envelope)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderItem, OrderStatus, PartySummary};

// ============================================================================
// Order Snapshot
// ============================================================================
//
// The fully hydrated order as returned by the order-management service after
// a committed transition. Notifications always carry a whole snapshot, never
// a diff, so this type is both the store record and the wire payload.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub customer_id: String,
    #[serde(default)]
    pub captain_id: Option<String>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub payment_status: bool,
    #[serde(default)]
    pub items: Vec<OrderItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<PartySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captain: Option<PartySummary>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_phone: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Display name of the customer, if the snapshot was hydrated with one.
    pub fn customer_name(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn is_assigned_to(&self, captain_id: &str) -> bool {
        self.captain_id.as_deref() == Some(captain_id)
    }

    /// First eight characters of the id, used in human-facing text.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    pub fn item_lines(&self) -> Vec<String> {
        self.items.iter().map(OrderItem::display_line).collect()
    }
}

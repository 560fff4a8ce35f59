use serde::Serialize;
use tokio::sync::broadcast;

use super::merge::MergeOutcome;
use super::view::MembershipPredicate;
use crate::domain::order::{Order, OrderStatus};
use crate::messaging::EventType;

// ============================================================================
// View Notifications
// ============================================================================
//
// Presentation side channel derived after a merge. The view state never
// depends on anyone receiving these; a lagging or absent receiver only
// misses alerts.
//
// ============================================================================

pub const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    Assigned,
    StatusChanged,
    Settled,
    LeftView,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewNotification {
    pub view: &'static str,
    pub kind: NotificationKind,
    pub event_type: EventType,
    pub order_id: String,
    #[serde(skip)]
    short_id: String,
    pub status: OrderStatus,
    pub lines: Vec<String>,
    pub total_amount: f64,
}

impl ViewNotification {
    pub fn from_merge<P>(predicate: &P, event_type: EventType, outcome: MergeOutcome, order: &Order) -> Option<Self>
    where
        P: MembershipPredicate + ?Sized,
    {
        let kind = predicate.notification_for(event_type, outcome)?;
        Some(Self {
            view: predicate.name(),
            kind,
            event_type,
            order_id: order.id.clone(),
            short_id: order.short_id().to_string(),
            status: order.status,
            lines: order.item_lines(),
            total_amount: order.total_amount,
        })
    }

    pub fn headline(&self) -> String {
        let short_id = &self.short_id;
        match self.kind {
            NotificationKind::NewOrder => format!("New order #{} ({:.0})", short_id, self.total_amount),
            NotificationKind::Assigned => format!("Delivery #{} assigned to you", short_id),
            NotificationKind::StatusChanged => format!("Order #{} is now {}", short_id, self.status),
            NotificationKind::Settled => format!("Order #{} settled ({:.0})", short_id, self.total_amount),
            NotificationKind::LeftView => format!("Order #{} moved on ({})", short_id, self.status),
        }
    }
}

pub fn channel() -> (broadcast::Sender<ViewNotification>, broadcast::Receiver<ViewNotification>) {
    broadcast::channel(NOTIFICATION_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::RoleView;

    fn order() -> Order {
        serde_json::from_value(serde_json::json!({
            "id": "abcdef0123456789",
            "status": "PREPARING",
            "customerId": "c-1",
            "totalAmount": 150.0,
            "items": [{"id": "i-1", "menuItemId": "m-1", "quantity": 2,
                       "menuItem": {"name": "Egg Pancake"}}]
        }))
        .unwrap()
    }

    #[test]
    fn test_kitchen_new_order() {
        let notification =
            ViewNotification::from_merge(&RoleView::Kitchen, EventType::Update, MergeOutcome::Inserted, &order())
                .unwrap();

        assert_eq!(notification.view, "kitchen");
        assert_eq!(notification.kind, NotificationKind::NewOrder);
        assert_eq!(notification.lines, vec!["Egg Pancake × 2".to_string()]);
        assert_eq!(notification.headline(), "New order #abcdef01 (150)");
    }

    #[test]
    fn test_owner_settled_headline() {
        let mut settled = order();
        settled.id = "o-7".to_string();
        settled.status = OrderStatus::Delivered;
        settled.payment_status = true;

        let notification =
            ViewNotification::from_merge(&RoleView::Owner, EventType::Update, MergeOutcome::Inserted, &settled)
                .unwrap();

        assert_eq!(notification.kind, NotificationKind::Settled);
        assert_eq!(notification.headline(), "Order #o-7 settled (150)");
    }

    #[test]
    fn test_no_notification_for_silent_outcomes() {
        assert!(
            ViewNotification::from_merge(&RoleView::Kitchen, EventType::Update, MergeOutcome::Ignored, &order())
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_receiver() {
        let (tx, mut first) = channel();
        let mut second = tx.subscribe();
        let notification =
            ViewNotification::from_merge(&RoleView::Kitchen, EventType::Create, MergeOutcome::Inserted, &order())
                .unwrap();

        tx.send(notification).unwrap();

        assert_eq!(first.recv().await.unwrap().order_id, "abcdef0123456789");
        assert_eq!(second.recv().await.unwrap().kind, NotificationKind::NewOrder);
    }
}

use std::fmt;
use std::str::FromStr;

use super::merge::MergeOutcome;
use super::notification::NotificationKind;
use crate::domain::order::{Order, OrderStatus};
use crate::messaging::EventType;

// ============================================================================
// View Membership
// ============================================================================
//
// A predicate decides, from one snapshot alone, whether an order belongs in a
// view. It is evaluated fresh for every message and never cached, so an order
// leaves a view as soon as a snapshot stops satisfying it.
//
// ============================================================================

pub trait MembershipPredicate: Send + Sync {
    /// Stable label used in logs and metrics.
    fn name(&self) -> &'static str;

    fn matches(&self, order: &Order) -> bool;

    /// Which alert, if any, a merge result raises for this view.
    fn notification_for(&self, _event_type: EventType, outcome: MergeOutcome) -> Option<NotificationKind> {
        match outcome {
            MergeOutcome::Inserted => Some(NotificationKind::NewOrder),
            MergeOutcome::Removed => Some(NotificationKind::LeftView),
            MergeOutcome::Replaced | MergeOutcome::Ignored => None,
        }
    }
}

/// Built-in role views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleView {
    /// Orders being cooked.
    Kitchen,
    /// Orders waiting for staff to accept them.
    StaffPending,
    /// Orders ready for pickup or hand-off to a captain.
    StaffReady,
    /// Deliveries currently assigned to one captain.
    Captain { captain_id: String },
    /// Every order placed by one customer.
    Customer { customer_id: String },
    /// One customer's finished orders.
    CustomerHistory { customer_id: String },
    /// Paid orders that finished, pickup or delivery.
    Owner,
}

impl MembershipPredicate for RoleView {
    fn name(&self) -> &'static str {
        match self {
            RoleView::Kitchen => "kitchen",
            RoleView::StaffPending => "staff-pending",
            RoleView::StaffReady => "staff-ready",
            RoleView::Captain { .. } => "captain",
            RoleView::Customer { .. } => "customer",
            RoleView::CustomerHistory { .. } => "history",
            RoleView::Owner => "owner",
        }
    }

    fn matches(&self, order: &Order) -> bool {
        match self {
            RoleView::Kitchen => order.status == OrderStatus::Preparing,
            RoleView::StaffPending => order.status == OrderStatus::Pending,
            RoleView::StaffReady => order.status == OrderStatus::Ready,
            RoleView::Captain { captain_id } => {
                order.is_assigned_to(captain_id) && order.status == OrderStatus::Delivering
            }
            RoleView::Customer { customer_id } => order.customer_id == *customer_id,
            RoleView::CustomerHistory { customer_id } => {
                order.customer_id == *customer_id
                    && matches!(order.status, OrderStatus::Completed | OrderStatus::Delivered)
            }
            RoleView::Owner => {
                order.payment_status
                    && matches!(order.status, OrderStatus::Completed | OrderStatus::Delivered)
            }
        }
    }

    fn notification_for(&self, event_type: EventType, outcome: MergeOutcome) -> Option<NotificationKind> {
        match (self, outcome) {
            (_, MergeOutcome::Removed) => Some(NotificationKind::LeftView),
            (RoleView::Captain { .. }, MergeOutcome::Inserted) => {
                (event_type == EventType::AssignCaptain).then_some(NotificationKind::Assigned)
            }
            (
                RoleView::Customer { .. } | RoleView::CustomerHistory { .. },
                MergeOutcome::Inserted | MergeOutcome::Replaced,
            ) => Some(NotificationKind::StatusChanged),
            (RoleView::Owner, MergeOutcome::Inserted) => Some(NotificationKind::Settled),
            (_, MergeOutcome::Inserted) => Some(NotificationKind::NewOrder),
            _ => None,
        }
    }
}

impl fmt::Display for RoleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleView::Captain { captain_id } => write!(f, "captain:{}", captain_id),
            RoleView::Customer { customer_id } => write!(f, "customer:{}", customer_id),
            RoleView::CustomerHistory { customer_id } => write!(f, "history:{}", customer_id),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewParseError {
    #[error("Unknown view: {0}")]
    Unknown(String),

    #[error("View {0} needs an id, e.g. {0}:<id>")]
    MissingId(&'static str),
}

impl FromStr for RoleView {
    type Err = ViewParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind, Some(id.trim()).filter(|id| !id.is_empty())),
            None => (s, None),
        };

        let require_id = |label: &'static str| {
            id.map(str::to_string).ok_or(ViewParseError::MissingId(label))
        };

        match kind.to_ascii_lowercase().as_str() {
            "kitchen" => Ok(RoleView::Kitchen),
            "staff-pending" | "pending" => Ok(RoleView::StaffPending),
            "staff-ready" | "ready" => Ok(RoleView::StaffReady),
            "owner" => Ok(RoleView::Owner),
            "captain" => Ok(RoleView::Captain {
                captain_id: require_id("captain")?,
            }),
            "customer" => Ok(RoleView::Customer {
                customer_id: require_id("customer")?,
            }),
            "history" => Ok(RoleView::CustomerHistory {
                customer_id: require_id("history")?,
            }),
            _ => Err(ViewParseError::Unknown(s.to_string())),
        }
    }
}

use super::state::OrderViewState;
use super::view::MembershipPredicate;
use crate::domain::order::Order;
use crate::messaging::{DecodeError, OrderEventEnvelope};

// ============================================================================
// Decode → Filter → Merge
// ============================================================================
//
// Pure and synchronous: no I/O, no UI. Safe under duplicate and reordered
// delivery because every envelope carries the whole snapshot and membership
// is recomputed from it. The last processed envelope for an order wins.
//
//   present?  satisfied?  effect
//   no        yes         insert at front
//   yes       yes         replace in place
//   yes       no          remove
//   no        no          nothing
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Inserted => "inserted",
            MergeOutcome::Replaced => "replaced",
            MergeOutcome::Removed => "removed",
            MergeOutcome::Ignored => "ignored",
        }
    }

    /// Whether the view contents changed.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, MergeOutcome::Ignored)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result of applying one raw message to a view.
#[derive(Debug, Clone)]
pub struct Applied {
    pub envelope: OrderEventEnvelope,
    pub outcome: MergeOutcome,
}

/// Apply one snapshot to the view.
pub fn merge_snapshot<P>(state: &mut OrderViewState, predicate: &P, order: Order) -> MergeOutcome
where
    P: MembershipPredicate + ?Sized,
{
    let satisfied = predicate.matches(&order);
    let present = state.contains(&order.id);

    match (present, satisfied) {
        (false, true) => {
            state.insert_front(order);
            MergeOutcome::Inserted
        }
        (true, true) => {
            state.replace(order);
            MergeOutcome::Replaced
        }
        (true, false) => {
            state.remove(&order.id);
            MergeOutcome::Removed
        }
        (false, false) => MergeOutcome::Ignored,
    }
}

pub fn merge<P>(state: &mut OrderViewState, predicate: &P, envelope: &OrderEventEnvelope) -> MergeOutcome
where
    P: MembershipPredicate + ?Sized,
{
    merge_snapshot(state, predicate, envelope.order.clone())
}

/// Replace the view contents with the result of an initial fetch, keeping
/// only orders the predicate accepts. Input order is preserved.
pub fn seed<P>(state: &mut OrderViewState, predicate: &P, orders: Vec<Order>) -> usize
where
    P: MembershipPredicate + ?Sized,
{
    state.clear();
    for order in orders.into_iter().rev() {
        merge_snapshot(state, predicate, order);
    }
    state.len()
}

/// Decode a raw broker payload and merge it. On error the state is left
/// untouched.
pub fn process_message<P>(
    state: &mut OrderViewState,
    predicate: &P,
    raw: &[u8],
) -> Result<Applied, ConsumeError>
where
    P: MembershipPredicate + ?Sized,
{
    let envelope = OrderEventEnvelope::decode(raw)?;
    let outcome = merge(state, predicate, &envelope);
    Ok(Applied { envelope, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::RoleView;
    use crate::domain::order::OrderStatus;
    use crate::messaging::EventType;

    fn order(id: &str, status: OrderStatus, customer: &str) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "status": status,
            "customerId": customer,
        }))
        .unwrap()
    }

    fn raw(order: &Order, event_type: EventType) -> Vec<u8> {
        OrderEventEnvelope::for_order(order, event_type)
            .encode()
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let mut once = OrderViewState::new();
        let mut twice = OrderViewState::new();
        let message = raw(&order("o-1", OrderStatus::Preparing, "c-1"), EventType::Update);

        process_message(&mut once, &RoleView::Kitchen, &message).unwrap();
        process_message(&mut twice, &RoleView::Kitchen, &message).unwrap();
        let second = process_message(&mut twice, &RoleView::Kitchen, &message).unwrap();

        assert_eq!(once, twice);
        assert_eq!(second.outcome, MergeOutcome::Replaced);
    }

    #[test]
    fn test_last_processed_wins_under_reordering() {
        let view = RoleView::Customer {
            customer_id: "c-1".to_string(),
        };
        let older = order("o-1", OrderStatus::Pending, "c-1");
        let newer = order("o-1", OrderStatus::Preparing, "c-1");

        let mut state = OrderViewState::new();
        process_message(&mut state, &view, &raw(&newer, EventType::Update)).unwrap();
        process_message(&mut state, &view, &raw(&older, EventType::Create)).unwrap();

        // No sequence numbers: a stale envelope processed last overwrites.
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("o-1").unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_kitchen_drops_order_when_ready() {
        let mut state = OrderViewState::new();
        let preparing = order("o-1", OrderStatus::Preparing, "c-1");
        let ready = order("o-1", OrderStatus::Ready, "c-1");

        let inserted = process_message(&mut state, &RoleView::Kitchen, &raw(&preparing, EventType::Update)).unwrap();
        assert_eq!(inserted.outcome, MergeOutcome::Inserted);
        assert!(state.contains("o-1"));

        let removed = process_message(&mut state, &RoleView::Kitchen, &raw(&ready, EventType::Update)).unwrap();
        assert_eq!(removed.outcome, MergeOutcome::Removed);
        assert!(state.is_empty());
    }

    #[test]
    fn test_kitchen_reinserts_redelivered_stale_snapshot() {
        let mut state = OrderViewState::new();
        let preparing = raw(&order("o-1", OrderStatus::Preparing, "c-1"), EventType::Update);
        let ready = raw(&order("o-1", OrderStatus::Ready, "c-1"), EventType::Update);

        process_message(&mut state, &RoleView::Kitchen, &preparing).unwrap();
        process_message(&mut state, &RoleView::Kitchen, &ready).unwrap();
        assert!(state.is_empty());

        // A late redelivery of the older snapshot wins because it was processed last.
        let again = process_message(&mut state, &RoleView::Kitchen, &preparing).unwrap();
        assert_eq!(again.outcome, MergeOutcome::Inserted);
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("o-1").unwrap().status, OrderStatus::Preparing);
    }

    #[test]
    fn test_customer_view_only_holds_own_orders_in_any_order() {
        let view = RoleView::Customer {
            customer_id: "A".to_string(),
        };
        let messages = vec![
            raw(&order("o-a1", OrderStatus::Pending, "A"), EventType::Create),
            raw(&order("o-b1", OrderStatus::Pending, "B"), EventType::Create),
            raw(&order("o-c1", OrderStatus::Preparing, "C"), EventType::Update),
            raw(&order("o-a2", OrderStatus::Ready, "A"), EventType::Update),
            raw(&order("o-b1", OrderStatus::Completed, "B"), EventType::Update),
        ];

        let mut forward = OrderViewState::new();
        for message in &messages {
            process_message(&mut forward, &view, message).unwrap();
        }
        let mut backward = OrderViewState::new();
        for message in messages.iter().rev() {
            process_message(&mut backward, &view, message).unwrap();
        }

        for state in [&forward, &backward] {
            assert_eq!(state.len(), 2);
            assert!(state.orders().iter().all(|o| o.customer_id == "A"));
        }
    }

    #[test]
    fn test_malformed_messages_leave_state_untouched() {
        let mut state = OrderViewState::new();
        let kept = order("o-1", OrderStatus::Pending, "c-1");
        process_message(&mut state, &RoleView::StaffPending, &raw(&kept, EventType::Create)).unwrap();
        let before = state.clone();

        assert!(process_message(&mut state, &RoleView::StaffPending, b"{{{{").is_err());
        assert!(process_message(
            &mut state,
            &RoleView::StaffPending,
            br#"{"type":"update","orderId":"o-1","status":"READY"}"#
        )
        .is_err());
        assert_eq!(state, before);

        let valid = order("o-2", OrderStatus::Pending, "c-1");
        let applied =
            process_message(&mut state, &RoleView::StaffPending, &raw(&valid, EventType::Create)).unwrap();
        assert!(applied.outcome.is_mutation());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_irrelevant_order_is_ignored() {
        let mut state = OrderViewState::new();
        let outcome = merge_snapshot(
            &mut state,
            &RoleView::Kitchen,
            order("o-1", OrderStatus::Completed, "c-1"),
        );

        assert_eq!(outcome, MergeOutcome::Ignored);
        assert!(state.is_empty());
    }

    #[test]
    fn test_seed_filters_and_keeps_fetch_order() {
        let mut state = OrderViewState::new();
        state.insert_front(order("stale", OrderStatus::Pending, "c-1"));

        let kept = seed(
            &mut state,
            &RoleView::StaffPending,
            vec![
                order("o-3", OrderStatus::Pending, "c-1"),
                order("o-2", OrderStatus::Ready, "c-1"),
                order("o-1", OrderStatus::Pending, "c-1"),
            ],
        );

        assert_eq!(kept, 2);
        assert_eq!(state.ids(), vec!["o-3", "o-1"]);
    }
}

use crate::domain::order::Order;

/// Orders currently shown by one view, newest first.
///
/// Each present entry is the most recently processed snapshot that
/// satisfied the view's membership predicate. Entries are only ever
/// replaced whole; mutation goes through the merge in this module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderViewState {
    orders: Vec<Order>,
}

impl OrderViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.position(order_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.orders.iter().map(|o| o.id.as_str()).collect()
    }

    fn position(&self, order_id: &str) -> Option<usize> {
        self.orders.iter().position(|o| o.id == order_id)
    }

    pub(crate) fn insert_front(&mut self, order: Order) {
        self.orders.insert(0, order);
    }

    /// Swap in a newer snapshot, keeping its position. Returns false when
    /// the order is not present.
    pub(crate) fn replace(&mut self, order: Order) -> bool {
        match self.position(&order.id) {
            Some(idx) => {
                self.orders[idx] = order;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, order_id: &str) -> Option<Order> {
        self.position(order_id).map(|idx| self.orders.remove(idx))
    }

    pub(crate) fn clear(&mut self) {
        self.orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;

    fn order(id: &str, status: OrderStatus) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "status": status,
            "customerId": "cust-1",
        }))
        .unwrap()
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut state = OrderViewState::new();
        state.insert_front(order("a", OrderStatus::Pending));
        state.insert_front(order("b", OrderStatus::Pending));

        assert_eq!(state.ids(), vec!["b", "a"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut state = OrderViewState::new();
        state.insert_front(order("a", OrderStatus::Pending));
        state.insert_front(order("b", OrderStatus::Pending));

        assert!(state.replace(order("a", OrderStatus::Preparing)));
        assert_eq!(state.ids(), vec!["b", "a"]);
        assert_eq!(state.get("a").unwrap().status, OrderStatus::Preparing);

        assert!(!state.replace(order("zzz", OrderStatus::Ready)));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut state = OrderViewState::new();
        state.insert_front(order("a", OrderStatus::Pending));

        assert_eq!(state.remove("a").map(|o| o.id), Some("a".to_string()));
        assert!(state.remove("a").is_none());
        assert!(state.is_empty());
    }
}

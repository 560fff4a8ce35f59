use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::errors::OrderError;
use super::model::Order;

/// Persistence for committed order snapshots.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str) -> Result<Order, OrderError>;

    /// Insert or overwrite; returns the stored snapshot.
    async fn save(&self, order: Order) -> Result<Order, OrderError>;

    /// All orders, newest first.
    async fn list(&self) -> Vec<Order>;
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    async fn save(&self, order: Order) -> Result<Order, OrderError> {
        self.orders.write().await.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn list(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.read().await.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use chrono::{Duration, Utc};

    fn order(id: &str, minutes_ago: i64) -> Order {
        let mut order: Order = serde_json::from_value(serde_json::json!({
            "id": id,
            "status": "PENDING",
            "customerId": "c-1",
        }))
        .unwrap();
        order.created_at = Some(Utc::now() - Duration::minutes(minutes_ago));
        order
    }

    #[tokio::test]
    async fn test_save_get_and_list() {
        let store = InMemoryOrderStore::new();
        store.save(order("old", 10)).await.unwrap();
        store.save(order("new", 1)).await.unwrap();

        let mut updated = store.get("old").await.unwrap();
        updated.status = OrderStatus::Preparing;
        store.save(updated).await.unwrap();

        assert_eq!(store.get("old").await.unwrap().status, OrderStatus::Preparing);
        let ids: Vec<String> = store.list().await.into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let store = InMemoryOrderStore::new();
        assert!(matches!(store.get("nope").await, Err(OrderError::NotFound(id)) if id == "nope"));
    }
}

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::OrderError;
use super::model::Order;
use super::store::OrderStore;
use super::value_objects::{MenuItemSummary, OrderItem, OrderStatus, PartySummary};
use crate::messaging::{EventType, OrderEventPublisher};

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: validate → commit to store → publish snapshot
//
// The publish happens strictly after the commit and its outcome is only
// logged. A broker outage never fails, blocks, or rolls back a transition.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub special_request: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: PartySummary,
    pub items: Vec<NewOrderItem>,
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    publisher: Arc<OrderEventPublisher>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, publisher: Arc<OrderEventPublisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn create_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        if new_order.customer.id.is_empty() {
            return Err(OrderError::MissingParameter("customerId"));
        }
        if new_order.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        if let Some(bad) = new_order.items.iter().find(|item| item.quantity <= 0) {
            return Err(OrderError::InvalidQuantity(bad.quantity));
        }
        if let Some(bad) = new_order
            .items
            .iter()
            .find(|item| !item.price.is_finite() || item.price < 0.0)
        {
            return Err(OrderError::InvalidPrice(bad.price));
        }

        let total_amount = new_order
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();

        let items = new_order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4().to_string(),
                menu_item_id: item.menu_item_id,
                quantity: item.quantity,
                special_request: item.special_request,
                menu_item: Some(MenuItemSummary {
                    name: item.name,
                    price: Some(item.price),
                }),
            })
            .collect();

        let order = Order {
            id: Uuid::new_v4().to_string(),
            status: OrderStatus::Pending,
            customer_id: new_order.customer.id.clone(),
            captain_id: None,
            total_amount,
            payment_status: false,
            items,
            customer: Some(new_order.customer),
            captain: None,
            delivery_address: None,
            delivery_phone: None,
            created_at: Some(Utc::now()),
            completed_at: None,
            delivered_at: None,
        };

        let order = self.store.save(order).await?;
        tracing::info!(order_id = %order.id, total = order.total_amount, "Order created");

        self.publisher.notify(&order, EventType::Create).await;
        Ok(order)
    }

    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<Order, OrderError> {
        if order_id.is_empty() {
            return Err(OrderError::MissingParameter("orderId"));
        }

        let mut order = self.store.get(order_id).await?;
        let previous = order.status;
        order.status = status;

        match status {
            OrderStatus::Completed => {
                order.completed_at = Some(Utc::now());
                order.payment_status = true;
            }
            OrderStatus::Delivered => {
                order.delivered_at = Some(Utc::now());
                order.payment_status = true;
            }
            _ => {}
        }

        let order = self.store.save(order).await?;
        tracing::info!(order_id = %order.id, from = %previous, to = %status, "Order status updated");

        self.publisher.notify(&order, EventType::Update).await;
        Ok(order)
    }

    pub async fn assign_captain(
        &self,
        order_id: &str,
        captain: PartySummary,
        delivery_address: impl Into<String>,
        delivery_phone: impl Into<String>,
    ) -> Result<Order, OrderError> {
        if order_id.is_empty() {
            return Err(OrderError::MissingParameter("orderId"));
        }
        if captain.id.is_empty() {
            return Err(OrderError::MissingParameter("captainId"));
        }

        let mut order = self.store.get(order_id).await?;
        order.captain_id = Some(captain.id.clone());
        order.captain = Some(captain);
        order.status = OrderStatus::Delivering;
        order.delivery_address = Some(delivery_address.into());
        order.delivery_phone = Some(delivery_phone.into());

        let order = self.store.save(order).await?;
        tracing::info!(
            order_id = %order.id,
            captain_id = order.captain_id.as_deref().unwrap_or_default(),
            "Captain assigned"
        );

        self.publisher.notify(&order, EventType::AssignCaptain).await;
        Ok(order)
    }

    /// Orders for the initial fetch of a view, newest first.
    pub async fn list_orders(&self) -> Vec<Order> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{OrderViewSubscription, RoleView};
    use crate::domain::order::InMemoryOrderStore;
    use crate::metrics::Metrics;
    use crate::transport::{InMemoryBroker, Transport};
    use std::time::Duration;

    const TOPIC: &str = "nuu/esic/breakfirst";

    fn new_order(customer: &str) -> NewOrder {
        NewOrder {
            customer: PartySummary::new(customer).with_name("Amy"),
            items: vec![
                NewOrderItem {
                    menu_item_id: "m-1".to_string(),
                    name: "Egg Pancake".to_string(),
                    price: 45.0,
                    quantity: 2,
                    special_request: None,
                },
                NewOrderItem {
                    menu_item_id: "m-2".to_string(),
                    name: "Milk Tea".to_string(),
                    price: 30.0,
                    quantity: 1,
                    special_request: Some("less ice".to_string()),
                },
            ],
        }
    }

    fn service_on(transport: Arc<dyn Transport>, metrics: Arc<Metrics>) -> OrderService {
        let publisher = Arc::new(OrderEventPublisher::new(transport, TOPIC, metrics));
        OrderService::new(Arc::new(InMemoryOrderStore::new()), publisher)
    }

    #[tokio::test]
    async fn test_create_order() {
        let broker = InMemoryBroker::new();
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = service_on(Arc::new(broker.connect("server")), metrics.clone());

        let order = service.create_order(new_order("c-1")).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, 120.0);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.customer_name(), Some("Amy"));
        assert_eq!(
            metrics.envelopes_published.with_label_values(&["create"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_create_order_validation() {
        let broker = InMemoryBroker::new();
        let service = service_on(Arc::new(broker.connect("server")), Arc::new(Metrics::new().unwrap()));

        let mut empty = new_order("c-1");
        empty.items.clear();
        assert!(matches!(service.create_order(empty).await, Err(OrderError::EmptyItems)));

        let mut zero = new_order("c-1");
        zero.items[0].quantity = 0;
        assert!(matches!(
            service.create_order(zero).await,
            Err(OrderError::InvalidQuantity(0))
        ));

        assert!(matches!(
            service.create_order(new_order("")).await,
            Err(OrderError::MissingParameter("customerId"))
        ));
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_prices() {
        let broker = InMemoryBroker::new();
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = service_on(Arc::new(broker.connect("server")), metrics.clone());

        let mut negative = new_order("c-1");
        negative.items[1].price = -5.0;
        assert!(matches!(
            service.create_order(negative).await,
            Err(OrderError::InvalidPrice(p)) if p == -5.0
        ));

        let mut not_a_number = new_order("c-1");
        not_a_number.items[0].price = f64::NAN;
        assert!(matches!(
            service.create_order(not_a_number).await,
            Err(OrderError::InvalidPrice(p)) if p.is_nan()
        ));

        let mut free = new_order("c-1");
        free.items[0].price = 0.0;
        assert!(service.create_order(free).await.is_ok());

        assert_eq!(service.list_orders().await.len(), 1);
        assert_eq!(metrics.envelopes_published.with_label_values(&["create"]).get(), 1);
    }

    #[tokio::test]
    async fn test_terminal_transitions_stamp_order() {
        let broker = InMemoryBroker::new();
        let service = service_on(Arc::new(broker.connect("server")), Arc::new(Metrics::new().unwrap()));
        let order = service.create_order(new_order("c-1")).await.unwrap();

        let completed = service.update_status(&order.id, OrderStatus::Completed).await.unwrap();
        assert!(completed.payment_status);
        assert!(completed.completed_at.is_some());
        assert!(completed.delivered_at.is_none());

        assert!(matches!(
            service.update_status("missing", OrderStatus::Ready).await,
            Err(OrderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_succeeds_with_broker_down() {
        let broker = InMemoryBroker::new();
        let transport = Arc::new(broker.connect("server"));
        transport.set_connected(false);
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = service_on(transport.clone(), metrics.clone());

        let order = service.create_order(new_order("c-1")).await.unwrap();
        service.update_status(&order.id, OrderStatus::Preparing).await.unwrap();
        service.update_status(&order.id, OrderStatus::Ready).await.unwrap();

        // Permanently gone from here on.
        transport.close().await;
        let assigned = service
            .assign_captain(&order.id, PartySummary::new("cap-1"), "No. 1 Lane", "0912")
            .await
            .unwrap();
        assert_eq!(assigned.status, OrderStatus::Delivering);

        let delivered = service.update_status(&order.id, OrderStatus::Delivered).await.unwrap();
        assert!(delivered.payment_status);
        assert!(delivered.delivered_at.is_some());

        assert_eq!(
            metrics.publish_skipped.with_label_values(&["not_connected"]).get(),
            3
        );
        assert_eq!(metrics.publish_skipped.with_label_values(&["closed"]).get(), 2);
    }

    #[tokio::test]
    async fn test_delivery_flow_reaches_captain_and_customer_views() {
        let broker = InMemoryBroker::new();
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = service_on(Arc::new(broker.connect("server")), metrics.clone());

        let client: Arc<dyn Transport> = Arc::new(broker.connect("browser"));
        let captain = OrderViewSubscription::spawn(
            client.clone(),
            TOPIC,
            Arc::new(RoleView::Captain {
                captain_id: "cap-1".to_string(),
            }),
            metrics.clone(),
        )
        .unwrap();
        let customer = OrderViewSubscription::spawn(
            client,
            TOPIC,
            Arc::new(RoleView::Customer {
                customer_id: "c-1".to_string(),
            }),
            metrics,
        )
        .unwrap();
        let mut captain_alerts = captain.notifications();

        let order = service.create_order(new_order("c-1")).await.unwrap();
        service
            .assign_captain(
                &order.id,
                PartySummary::new("cap-1").with_name("Bob"),
                "No. 1 Lane",
                "0912",
            )
            .await
            .unwrap();

        let alert = tokio::time::timeout(Duration::from_secs(2), captain_alerts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert.order_id, order.id);

        service.update_status(&order.id, OrderStatus::Delivered).await.unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(2), captain.wait_for_processed(3))
            .await
            .unwrap());
        assert!(tokio::time::timeout(Duration::from_secs(2), customer.wait_for_processed(3))
            .await
            .unwrap());

        assert!(captain.is_empty().await);
        let history = customer.snapshot().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Delivered);
    }
}

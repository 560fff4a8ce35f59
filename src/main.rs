use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use breakfast_notify::config::Config;
use breakfast_notify::consumer::OrderViewSubscription;
use breakfast_notify::domain::order::{
    InMemoryOrderStore, NewOrder, NewOrderItem, OrderService, OrderStatus, PartySummary,
};
use breakfast_notify::health::HealthStatus;
use breakfast_notify::messaging::OrderEventPublisher;
use breakfast_notify::metrics::{self, Metrics};
use breakfast_notify::transport::{InMemoryBroker, MqttTransport, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, crate at DEBUG; override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,breakfast_notify=debug")),
        )
        .init();

    let config = Config::parse();
    tracing::info!("🚀 Starting breakfast order notifier");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Transport (one connection shared by every view) ===
    let local_broker = config.simulate.then(InMemoryBroker::new);
    let transport: Arc<dyn Transport> = match &local_broker {
        Some(broker) => {
            tracing::info!("🧪 Simulation mode: using in-process broker");
            Arc::new(broker.connect("notifier"))
        }
        None => {
            let transport_config = config.transport_config()?;
            let transport = MqttTransport::open(&transport_config, metrics.clone())?;
            tracing::info!(
                broker = %transport_config.broker_url,
                client_id = %transport.client_id(),
                topic = %config.topic,
                "📡 MQTT transport opened"
            );
            Arc::new(transport)
        }
    };

    // Metrics HTTP server runs on its own actix system
    let registry = Arc::new(metrics.registry().clone());
    let connection = transport.connection_state();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(registry, connection, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Connectivity indicator ===
    let mut connection = transport.connection_state();
    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let state = *connection.borrow_and_update();
            match HealthStatus::from(state) {
                HealthStatus::Healthy => tracing::info!("🟢 Real-time updates connected"),
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    tracing::warn!(state = state.as_str(), "🔴 {}", reason)
                }
            }
        }
    });

    // === 4. Views ===
    let mut views = Vec::new();
    for view in config.views() {
        let label = view.to_string();
        let subscription =
            OrderViewSubscription::spawn(transport.clone(), &config.topic, Arc::new(view), metrics.clone())?;
        spawn_alert_logger(label, &subscription);
        views.push(subscription);
    }

    // === 5. Optional local lifecycle ===
    if let Some(broker) = &local_broker {
        run_simulation(broker, &config.topic, metrics.clone()).await?;
        for view in &views {
            tracing::info!(view = view.view_name(), orders = view.len().await, "View contents after simulation");
            if view.view_name() == "owner" {
                let revenue = view.revenue().await;
                tracing::info!(
                    pickup = revenue.pickup_revenue,
                    delivery = revenue.delivery_revenue,
                    total = revenue.total_revenue,
                    "💰 Owner takings"
                );
            }
        }
    }

    tracing::info!("✅ Running. Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    for view in &views {
        view.close();
    }
    transport.close().await;

    Ok(())
}

fn spawn_alert_logger(label: String, subscription: &OrderViewSubscription) {
    let mut alerts = subscription.notifications();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => tracing::info!(
                    view = %label,
                    order_id = %alert.order_id,
                    items = ?alert.lines,
                    "🔔 {}",
                    alert.headline()
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(view = %label, missed = missed, "Alert receiver lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Walk one delivery order through its whole lifecycle on the in-process
/// broker, then one pickup order that gets cancelled.
async fn run_simulation(broker: &InMemoryBroker, topic: &str, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let server: Arc<dyn Transport> = Arc::new(broker.connect("order-service"));
    let publisher = Arc::new(OrderEventPublisher::new(server, topic, metrics));
    let service = OrderService::new(Arc::new(InMemoryOrderStore::new()), publisher);
    let step = Duration::from_millis(300);

    let order = service
        .create_order(NewOrder {
            customer: PartySummary::new("customer-1").with_name("Amy").with_phone("0912000111"),
            items: vec![
                NewOrderItem {
                    menu_item_id: "menu-egg-pancake".to_string(),
                    name: "Egg Pancake".to_string(),
                    price: 45.0,
                    quantity: 2,
                    special_request: Some("no scallion".to_string()),
                },
                NewOrderItem {
                    menu_item_id: "menu-milk-tea".to_string(),
                    name: "Milk Tea".to_string(),
                    price: 30.0,
                    quantity: 1,
                    special_request: None,
                },
            ],
        })
        .await?;
    tokio::time::sleep(step).await;

    for status in [OrderStatus::Preparing, OrderStatus::Ready] {
        service.update_status(&order.id, status).await?;
        tokio::time::sleep(step).await;
    }

    service
        .assign_captain(
            &order.id,
            PartySummary::new("captain-1").with_name("Bob"),
            "No. 1, University Rd.",
            "0912000111",
        )
        .await?;
    tokio::time::sleep(step).await;

    service.update_status(&order.id, OrderStatus::Delivered).await?;
    tokio::time::sleep(step).await;

    let pickup = service
        .create_order(NewOrder {
            customer: PartySummary::new("customer-2").with_name("Cid"),
            items: vec![NewOrderItem {
                menu_item_id: "menu-toast".to_string(),
                name: "Toast".to_string(),
                price: 25.0,
                quantity: 1,
                special_request: None,
            }],
        })
        .await?;
    tokio::time::sleep(step).await;
    service.update_status(&pickup.id, OrderStatus::Cancelled).await?;
    tokio::time::sleep(step).await;

    tracing::info!(orders = service.list_orders().await.len(), "Simulation finished");
    Ok(())
}

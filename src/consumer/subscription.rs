use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use super::merge;
use super::notification::{self, ViewNotification};
use super::revenue::RevenueSummary;
use super::state::OrderViewState;
use super::view::MembershipPredicate;
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::transport::{InboundMessage, MessageHandler, SubscriptionId, Transport, TransportError};

// ============================================================================
// Order View Subscription
// ============================================================================
//
// Binds one view to the shared transport. The transport handler only
// enqueues raw payloads; a single task per view drains the queue and runs
// decode → filter → merge, so a view never processes two messages at once.
// Different views share nothing but the transport.
//
// ============================================================================

pub struct OrderViewSubscription {
    transport: Arc<dyn Transport>,
    subscription_id: SubscriptionId,
    predicate: Arc<dyn MembershipPredicate>,
    state: Arc<RwLock<OrderViewState>>,
    notifications: broadcast::Sender<ViewNotification>,
    processed: watch::Receiver<u64>,
    worker: JoinHandle<()>,
    closed: AtomicBool,
}

impl OrderViewSubscription {
    pub fn spawn(
        transport: Arc<dyn Transport>,
        topic: &str,
        predicate: Arc<dyn MembershipPredicate>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let handler: MessageHandler = Arc::new(move |message: &InboundMessage| {
            // Receiver is gone only after teardown.
            let _ = tx.send(message.payload.clone());
        });
        let subscription_id = transport.subscribe(topic, handler)?;

        let state = Arc::new(RwLock::new(OrderViewState::new()));
        let (notifications, _) = notification::channel();
        let (processed_tx, processed) = watch::channel(0u64);

        let worker = tokio::spawn(run_view(
            rx,
            predicate.clone(),
            state.clone(),
            metrics,
            notifications.clone(),
            processed_tx,
        ));

        tracing::info!(view = predicate.name(), topic = %topic, "View subscribed");

        Ok(Self {
            transport,
            subscription_id,
            predicate,
            state,
            notifications,
            processed,
            worker,
            closed: AtomicBool::new(false),
        })
    }

    pub fn view_name(&self) -> &'static str {
        self.predicate.name()
    }

    /// Current view contents, newest first.
    pub async fn snapshot(&self) -> Vec<Order> {
        self.state.read().await.orders().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// Load the result of the initial fetch. Messages merged afterwards
    /// still win over the seeded snapshots.
    pub async fn seed(&self, orders: Vec<Order>) -> usize {
        let mut state = self.state.write().await;
        let kept = merge::seed(&mut state, self.predicate.as_ref(), orders);
        tracing::debug!(view = self.predicate.name(), kept = kept, "View seeded");
        kept
    }

    pub fn notifications(&self) -> broadcast::Receiver<ViewNotification> {
        self.notifications.subscribe()
    }

    /// Pickup and delivery takings over the orders currently in the view.
    pub async fn revenue(&self) -> RevenueSummary {
        RevenueSummary::from_orders(self.state.read().await.orders())
    }

    /// Wait until at least `count` messages have been handled. Returns
    /// false if the view was torn down first.
    pub async fn wait_for_processed(&self, count: u64) -> bool {
        let mut processed = self.processed.clone();
        // Bound first: the watch guard must drop before `processed` does.
        let reached = processed.wait_for(|n| *n >= count).await.is_ok();
        reached
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.unsubscribe(self.subscription_id);
        self.worker.abort();
        tracing::info!(view = self.predicate.name(), "View closed");
    }
}

impl Drop for OrderViewSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_view(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    predicate: Arc<dyn MembershipPredicate>,
    state: Arc<RwLock<OrderViewState>>,
    metrics: Arc<Metrics>,
    notifications: broadcast::Sender<ViewNotification>,
    processed: watch::Sender<u64>,
) {
    let view = predicate.name();

    while let Some(payload) = rx.recv().await {
        metrics.record_message_received(view);

        let result = {
            let mut state = state.write().await;
            merge::process_message(&mut state, predicate.as_ref(), &payload)
        };

        match result {
            Ok(applied) => {
                metrics.record_merge(view, applied.outcome);
                tracing::debug!(
                    view = view,
                    order_id = %applied.envelope.order_id,
                    status = %applied.envelope.status,
                    event_type = %applied.envelope.event_type,
                    outcome = applied.outcome.as_str(),
                    "Merged order event"
                );

                if let Some(alert) = ViewNotification::from_merge(
                    predicate.as_ref(),
                    applied.envelope.event_type,
                    applied.outcome,
                    &applied.envelope.order,
                ) {
                    // No receivers is fine.
                    let _ = notifications.send(alert);
                }
            }
            Err(e) => {
                metrics.record_decode_failure(view);
                tracing::warn!(view = view, error = %e, bytes = payload.len(), "Dropped undecodable message");
            }
        }

        processed.send_modify(|n| *n += 1);
    }
}

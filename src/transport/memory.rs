use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::registry::HandlerRegistry;
use super::topic;
use super::{ConnectionState, InboundMessage, MessageHandler, QoS, SubscriptionId, Transport, TransportError};

// ============================================================================
// In-Process Broker
// ============================================================================
//
// Fans every publish out to every connected endpoint, the same way the MQTT
// broker does for a shared topic. Used by tests and `--simulate` to exercise
// outages (per-endpoint offline switch) and at-least-once redelivery
// (duplicate delivery switch) without a network.
//
// ============================================================================

struct Endpoint {
    client_id: String,
    registry: HandlerRegistry,
    state: watch::Sender<ConnectionState>,
}

impl Endpoint {
    fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }
}

#[derive(Default)]
struct BrokerState {
    endpoints: Mutex<Vec<Arc<Endpoint>>>,
    duplicate_delivery: AtomicBool,
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoints(&self) -> MutexGuard<'_, Vec<Arc<Endpoint>>> {
        self.inner.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a connected transport. A client id already in use takes over
    /// the session: the previous endpoint is disconnected.
    pub fn connect(&self, client_id: impl Into<String>) -> InMemoryTransport {
        let client_id = client_id.into();
        let (state, _) = watch::channel(ConnectionState::Connected);
        let endpoint = Arc::new(Endpoint {
            client_id: client_id.clone(),
            registry: HandlerRegistry::new(),
            state,
        });

        let mut endpoints = self.endpoints();
        for existing in endpoints.iter().filter(|e| e.client_id == client_id) {
            tracing::warn!(client_id = %client_id, "Client id reused, disconnecting previous session");
            existing.state.send_replace(ConnectionState::Disconnected);
        }
        endpoints.retain(|e| e.client_id != client_id);
        endpoints.push(endpoint.clone());

        InMemoryTransport {
            broker: self.clone(),
            endpoint,
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver every message twice, as an at-least-once broker may.
    pub fn set_duplicate_delivery(&self, enabled: bool) {
        self.inner.duplicate_delivery.store(enabled, Ordering::SeqCst);
    }

    pub fn client_count(&self) -> usize {
        self.endpoints().len()
    }

    fn route(&self, message: &InboundMessage) -> usize {
        let targets: Vec<Arc<Endpoint>> = self
            .endpoints()
            .iter()
            .filter(|e| e.is_connected())
            .cloned()
            .collect();

        let rounds = if self.inner.duplicate_delivery.load(Ordering::SeqCst) { 2 } else { 1 };
        let mut delivered = 0;
        for _ in 0..rounds {
            for endpoint in &targets {
                delivered += endpoint.registry.dispatch(message);
            }
        }
        delivered
    }

    fn detach(&self, endpoint: &Arc<Endpoint>) {
        self.endpoints().retain(|e| !Arc::ptr_eq(e, endpoint));
    }
}

pub struct InMemoryTransport {
    broker: InMemoryBroker,
    endpoint: Arc<Endpoint>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    pub fn client_id(&self) -> &str {
        &self.endpoint.client_id
    }

    /// Simulate losing or regaining the broker connection.
    pub fn set_connected(&self, connected: bool) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let state = if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        self.endpoint.state.send_replace(state);
    }

    pub fn handler_count(&self) -> usize {
        self.endpoint.registry.len()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, _qos: QoS) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if !self.endpoint.is_connected() {
            return Err(TransportError::NotConnected);
        }
        topic::validate_topic(topic)?;

        let delivered = self.broker.route(&InboundMessage::new(topic, payload));
        tracing::trace!(topic = %topic, delivered = delivered, "Routed in-memory publish");
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        topic::validate_filter(topic)?;
        Ok(self.endpoint.registry.register(topic, handler, |_| {}))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.endpoint.registry.remove(id, |_| {})
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.endpoint.state.subscribe()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.broker.detach(&self.endpoint);
        self.endpoint.state.send_replace(ConnectionState::Closed);
    }
}

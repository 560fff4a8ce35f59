// ============================================================================
// Message Transport Adapter
// ============================================================================
//
// One long-lived broker connection per process, shared by the publisher and
// every view subscription. Connection lifecycle is explicit: a transport is
// opened by its constructor and torn down with `close()`.
//
// - mqtt     - rumqttc-backed adapter with reconnect/backoff
// - memory   - in-process broker used by tests and local simulation
// - topic    - MQTT topic filter matching
// - registry - handler bookkeeping shared by both adapters
//
// ============================================================================

pub mod memory;
pub mod mqtt;
mod registry;
pub mod topic;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::utils::IsTransient;

pub use memory::{InMemoryBroker, InMemoryTransport};
pub use mqtt::{MqttTransport, TransportConfig};

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// Observable state of the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        }
    }
}

/// A raw message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Callback invoked for every message on a subscribed topic.
///
/// Handlers run on the transport's delivery path and must not block; hand
/// the message off to a channel and return.
pub type MessageHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Transport is closed")]
    Closed,

    #[error("Outbound request queue is full")]
    QueueFull,

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("MQTT client error: {0}")]
    Client(String),
}

impl IsTransient for TransportError {
    fn is_transient(&self) -> bool {
        matches!(self, TransportError::QueueFull)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget publish. Fails fast with `NotConnected` during an
    /// outage; nothing is queued for later.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError>;

    /// Register a handler for every message matching `topic` for the
    /// lifetime of the connection, across reconnects.
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId, TransportError>;

    /// Remove a handler. Returns false if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    fn is_connected(&self) -> bool {
        self.connection_state().borrow().is_connected()
    }

    /// Tear down the connection and stop reconnecting.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_queue_pressure_is_transient() {
        assert!(TransportError::QueueFull.is_transient());
        assert!(!TransportError::NotConnected.is_transient());
        assert!(!TransportError::Closed.is_transient());
        assert!(!TransportError::Client("boom".to_string()).is_transient());
    }

    #[test]
    fn test_default_qos_is_at_least_once() {
        assert_eq!(QoS::default(), QoS::AtLeastOnce);
    }
}

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::HandlerRegistry;
use super::topic;
use super::{ConnectionState, InboundMessage, MessageHandler, QoS, SubscriptionId, Transport, TransportError};
use crate::metrics::Metrics;
use crate::utils::{Backoff, RetryConfig};

// ============================================================================
// MQTT Transport (rumqttc)
// ============================================================================
//
// Owns one broker session and the task driving its event loop:
// - clean session, so every ConnAck re-subscribes all registered filters
// - connection errors flip the state to Disconnected and back off
//   exponentially (bounded) before the next attempt
// - publishes are enqueued with `try_publish` and never wait on a stalled
//   connection; while disconnected they are rejected, not queued
//
// ============================================================================

pub const DEFAULT_BROKER_URL: &str = "wss://broker.emqx.io:8084/mqtt";
pub const DEFAULT_TOPIC: &str = "nuu/esic/breakfirst";

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub broker_url: String,
    /// Generated per connection when absent; must be unique per connection.
    pub client_id: Option<String>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    /// Capacity of the client → event loop request channel.
    pub request_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            client_id: None,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(4),
            reconnect_min: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            request_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrokerScheme {
    Tcp,
    Tls,
    Ws,
    Wss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrokerAddress {
    pub scheme: BrokerScheme,
    pub host: String,
    pub port: u16,
}

/// Parse `scheme://host[:port][/path]`.
pub(crate) fn parse_broker_url(url: &str) -> Result<BrokerAddress, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidBrokerUrl(format!("{} ({})", url, reason));

    let (scheme, rest) = url.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
    let (scheme, default_port) = match scheme.to_ascii_lowercase().as_str() {
        "mqtt" | "tcp" => (BrokerScheme::Tcp, 1883),
        "mqtts" | "ssl" | "tls" => (BrokerScheme::Tls, 8883),
        "ws" => (BrokerScheme::Ws, 80),
        "wss" => (BrokerScheme::Wss, 443),
        _ => return Err(invalid("unsupported scheme")),
    };

    // Websocket paths ride along in the full URL handed to rumqttc.
    let authority = match rest.find('/') {
        Some(idx) => &rest[..idx],
        None => rest,
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
            (host, port)
        }
        None => (authority, default_port),
    };

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok(BrokerAddress {
        scheme,
        host: host.to_string(),
        port,
    })
}

/// `breakfast_` followed by eight hex characters.
pub fn generate_client_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("breakfast_{}", &id[..8])
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

fn client_error(error: ClientError) -> TransportError {
    match error {
        ClientError::TryRequest(_) => TransportError::QueueFull,
        other => TransportError::Client(other.to_string()),
    }
}

/// State shared between the transport handle and its event loop task.
struct Shared {
    client: AsyncClient,
    client_id: String,
    registry: HandlerRegistry,
    state: watch::Sender<ConnectionState>,
    closing: AtomicBool,
    metrics: Arc<Metrics>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            self.metrics.set_transport_connected(state.is_connected());
            tracing::debug!(
                client_id = %self.client_id,
                from = previous.as_str(),
                to = state.as_str(),
                "MQTT connection state changed"
            );
        }
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    fn resubscribe_all(&self) {
        self.registry.for_each_filter(|filter| {
            match self.client.try_subscribe(filter, rumqttc::QoS::AtLeastOnce) {
                Ok(()) => tracing::info!(topic = %filter, "Subscribed to topic"),
                Err(e) => tracing::error!(topic = %filter, error = %e, "Failed to subscribe to topic"),
            }
        });
    }
}

pub struct MqttTransport {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Create the session and start driving it. Must be called from within
    /// a tokio runtime.
    pub fn open(config: &TransportConfig, metrics: Arc<Metrics>) -> Result<Self, TransportError> {
        let address = parse_broker_url(&config.broker_url)?;
        let client_id = config.client_id.clone().unwrap_or_else(generate_client_id);

        // Websocket transports take the full URL as the host.
        let host = match address.scheme {
            BrokerScheme::Ws | BrokerScheme::Wss => config.broker_url.clone(),
            BrokerScheme::Tcp | BrokerScheme::Tls => address.host.clone(),
        };

        let mut options = MqttOptions::new(client_id.clone(), host, address.port);
        options
            .set_keep_alive(config.keep_alive)
            .set_clean_session(true);

        match address.scheme {
            BrokerScheme::Tcp => {}
            BrokerScheme::Tls => {
                options.set_transport(rumqttc::Transport::tls_with_default_config());
            }
            BrokerScheme::Ws => {
                options.set_transport(rumqttc::Transport::Ws);
            }
            BrokerScheme::Wss => {
                options.set_transport(rumqttc::Transport::wss_with_default_config());
            }
        }

        let (client, mut event_loop) = AsyncClient::new(options, config.request_capacity.max(1));
        event_loop
            .network_options
            .set_connection_timeout(config.connect_timeout.as_secs().max(1));

        let (state, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            client,
            client_id: client_id.clone(),
            registry: HandlerRegistry::new(),
            state,
            closing: AtomicBool::new(false),
            metrics,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let backoff = Backoff::new(RetryConfig::reconnect(config.reconnect_min, config.reconnect_max));
        let handle = tokio::spawn(drive_event_loop(event_loop, shared.clone(), backoff, shutdown_rx));

        tracing::info!(
            client_id = %client_id,
            broker = %config.broker_url,
            "Opening MQTT connection"
        );

        Ok(Self {
            shared,
            shutdown,
            event_loop: Mutex::new(Some(handle)),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    shared: Arc<Shared>,
    mut backoff: Backoff,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                shared.set_state(ConnectionState::Connected);
                tracing::info!(client_id = %shared.client_id, "MQTT connected");
                shared.resubscribe_all();
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic.clone(), publish.payload.to_vec());
                let delivered = shared.registry.dispatch(&message);
                tracing::debug!(
                    topic = %message.topic,
                    bytes = message.payload.len(),
                    handlers = delivered,
                    "MQTT message received"
                );
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!(client_id = %shared.client_id, "Broker sent DISCONNECT");
                shared.set_state(ConnectionState::Disconnected);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) if shared.closing.load(Ordering::SeqCst) => {
                break;
            }
            Ok(_) => {}
            Err(error) => {
                if shared.closing.load(Ordering::SeqCst) {
                    break;
                }

                shared.set_state(ConnectionState::Disconnected);
                shared.metrics.record_reconnect_attempt();
                let delay = backoff.next_delay();
                tracing::warn!(
                    client_id = %shared.client_id,
                    error = %error,
                    attempt = backoff.attempt(),
                    delay_ms = delay.as_millis(),
                    "MQTT connection lost, reconnecting after delay"
                );

                let stop = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = shutdown.changed() => true,
                };
                if stop {
                    break;
                }
                shared.set_state(ConnectionState::Connecting);
            }
        }
    }

    shared.set_state(ConnectionState::Closed);
    tracing::info!(client_id = %shared.client_id, "MQTT event loop stopped");
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if !self.shared.is_connected() {
            return Err(TransportError::NotConnected);
        }
        topic::validate_topic(topic)?;

        self.shared
            .client
            .try_publish(topic, qos.into(), false, payload)
            .map_err(client_error)
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId, TransportError> {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        topic::validate_filter(topic)?;

        let shared = &self.shared;
        let id = shared.registry.register(topic, handler, |filter| {
            // Otherwise the next ConnAck subscribes it.
            if shared.is_connected() {
                if let Err(e) = shared.client.try_subscribe(filter, rumqttc::QoS::AtLeastOnce) {
                    tracing::warn!(topic = %filter, error = %e, "Subscribe deferred to next connect");
                }
            }
        });

        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let shared = &self.shared;
        shared.registry.remove(id, |filter| {
            if shared.is_connected() {
                if let Err(e) = shared.client.try_unsubscribe(filter) {
                    tracing::debug!(topic = %filter, error = %e, "Failed to unsubscribe at broker");
                }
            }
        })
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    async fn close(&self) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!(client_id = %self.shared.client_id, "Closing MQTT connection");

        let handle = self.event_loop.lock().await.take();
        let Some(mut handle) = handle else {
            return;
        };

        if self.shared.is_connected() && self.shared.client.try_disconnect().is_ok() {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle).await.is_ok() {
                return;
            }
        }

        let _ = self.shutdown.send(true);
        if tokio::time::timeout(Duration::from_secs(2), &mut handle).await.is_err() {
            handle.abort();
            self.shared.set_state(ConnectionState::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_websocket_url() {
        let address = parse_broker_url("wss://broker.emqx.io:8084/mqtt").unwrap();
        assert_eq!(address.scheme, BrokerScheme::Wss);
        assert_eq!(address.host, "broker.emqx.io");
        assert_eq!(address.port, 8084);
    }

    #[test]
    fn test_parse_default_ports() {
        assert_eq!(parse_broker_url("mqtt://localhost").unwrap().port, 1883);
        assert_eq!(parse_broker_url("mqtts://localhost").unwrap().port, 8883);
        assert_eq!(parse_broker_url("ws://localhost/mqtt").unwrap().port, 80);
        assert_eq!(parse_broker_url("tcp://10.0.0.5:1884").unwrap().port, 1884);
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        assert!(matches!(
            parse_broker_url("broker.emqx.io:1883"),
            Err(TransportError::InvalidBrokerUrl(_))
        ));
        assert!(parse_broker_url("http://broker.emqx.io").is_err());
        assert!(parse_broker_url("mqtt://:1883").is_err());
        assert!(parse_broker_url("mqtt://host:notaport").is_err());
    }

    #[test]
    fn test_generated_client_ids_are_unique() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(a.starts_with("breakfast_"));
        assert_eq!(a.len(), "breakfast_".len() + 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_open_starts_disconnected_and_rejects_publish() {
        let config = TransportConfig {
            broker_url: "mqtt://127.0.0.1:1".to_string(),
            reconnect_min: Duration::from_millis(50),
            reconnect_max: Duration::from_millis(100),
            ..TransportConfig::default()
        };
        let metrics = Arc::new(Metrics::new().unwrap());
        let transport = MqttTransport::open(&config, metrics).unwrap();

        assert!(!transport.is_connected());
        let result = transport.publish(DEFAULT_TOPIC, b"{}".to_vec(), QoS::AtLeastOnce).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));

        // Handlers may be registered before the first ConnAck.
        let id = transport
            .subscribe(DEFAULT_TOPIC, Arc::new(|_message: &InboundMessage| {}))
            .unwrap();
        assert!(transport.unsubscribe(id));

        transport.close().await;
        assert_eq!(*transport.connection_state().borrow(), ConnectionState::Closed);
        assert!(matches!(
            transport.publish(DEFAULT_TOPIC, Vec::new(), QoS::AtLeastOnce).await,
            Err(TransportError::Closed)
        ));
    }
}

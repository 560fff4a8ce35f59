use std::sync::Arc;

use super::envelope::{EventType, OrderEventEnvelope};
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::transport::{QoS, Transport, TransportError};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Order Event Publisher
// ============================================================================
//
// Called right after the order service commits a transition. Exactly one
// publish per transition on the single shared topic. Delivery is best
// effort: no outcome here is ever surfaced as an error to the caller.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published,
    /// Dropped without trying: the transport is down or closed.
    Skipped(TransportError),
    /// Tried and failed (encode error or transport error after retries).
    Failed(String),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

pub struct OrderEventPublisher {
    transport: Arc<dyn Transport>,
    topic: String,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl OrderEventPublisher {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry: RetryConfig::none(),
            metrics,
        }
    }

    /// Retry transient publish errors (outbound queue pressure). Outages
    /// are never retried.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn notify(&self, order: &Order, event_type: EventType) -> PublishOutcome {
        let envelope = OrderEventEnvelope::for_order(order, event_type);
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    order_id = %order.id,
                    event_type = %event_type,
                    error = %e,
                    "Failed to encode order event"
                );
                self.metrics.record_publish_skipped("encode");
                return PublishOutcome::Failed(e.to_string());
            }
        };

        let transport = self.transport.clone();
        let topic = self.topic.clone();
        let result = retry_on_transient(self.retry.clone(), |_attempt| {
            let transport = transport.clone();
            let topic = topic.clone();
            let payload = payload.clone().into_bytes();
            async move { transport.publish(&topic, payload, QoS::AtLeastOnce).await }
        })
        .await;

        match result {
            RetryResult::Success(()) => {
                self.metrics.record_published(event_type.as_str());
                tracing::info!(
                    topic = %self.topic,
                    order_id = %order.id,
                    status = %order.status,
                    event_type = %event_type,
                    "Published order event"
                );
                PublishOutcome::Published
            }
            RetryResult::PermanentFailure(e @ (TransportError::NotConnected | TransportError::Closed)) => {
                self.metrics.record_publish_skipped(skip_reason(&e));
                tracing::warn!(
                    topic = %self.topic,
                    order_id = %order.id,
                    event_type = %event_type,
                    reason = %e,
                    "Broker unavailable, order event dropped"
                );
                PublishOutcome::Skipped(e)
            }
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => {
                self.metrics.record_publish_skipped(skip_reason(&e));
                tracing::error!(
                    topic = %self.topic,
                    order_id = %order.id,
                    event_type = %event_type,
                    error = %e,
                    "Failed to publish order event"
                );
                PublishOutcome::Failed(e.to_string())
            }
        }
    }
}

fn skip_reason(error: &TransportError) -> &'static str {
    match error {
        TransportError::NotConnected => "not_connected",
        TransportError::Closed => "closed",
        TransportError::QueueFull => "queue_full",
        TransportError::InvalidTopic(_) => "invalid_topic",
        TransportError::InvalidBrokerUrl(_) | TransportError::Client(_) => "client_error",
    }
}

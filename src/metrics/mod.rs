// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::consumer::MergeOutcome;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the notification path
// ============================================================================
//
// Covers:
// - envelopes published / skipped by the publisher
// - messages received, decode failures and merge outcomes per view
// - broker connection state and reconnect attempts
//
// Scraped via /metrics (see server.rs).
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Publisher
    pub envelopes_published: IntCounterVec,
    pub publish_skipped: IntCounterVec,

    // Consumers
    pub messages_received: IntCounterVec,
    pub decode_failures: IntCounterVec,
    pub merge_outcomes: IntCounterVec,

    // Transport
    pub transport_connected: IntGauge,
    pub reconnect_attempts: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let envelopes_published = IntCounterVec::new(
            Opts::new("notify_envelopes_published_total", "Order event envelopes handed to the broker"),
            &["event_type"],
        )?;
        registry.register(Box::new(envelopes_published.clone()))?;

        let publish_skipped = IntCounterVec::new(
            Opts::new("notify_publish_skipped_total", "Order notifications dropped by the publisher"),
            &["reason"],
        )?;
        registry.register(Box::new(publish_skipped.clone()))?;

        let messages_received = IntCounterVec::new(
            Opts::new("notify_messages_received_total", "Raw messages received per view"),
            &["view"],
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let decode_failures = IntCounterVec::new(
            Opts::new("notify_decode_failures_total", "Messages dropped because they did not decode"),
            &["view"],
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let merge_outcomes = IntCounterVec::new(
            Opts::new("notify_merge_outcomes_total", "View state merge outcomes"),
            &["view", "outcome"],
        )?;
        registry.register(Box::new(merge_outcomes.clone()))?;

        let transport_connected = IntGauge::new(
            "notify_transport_connected",
            "Broker connection state (1=connected, 0=not connected)",
        )?;
        registry.register(Box::new(transport_connected.clone()))?;

        let reconnect_attempts = IntCounter::new(
            "notify_reconnect_attempts_total",
            "Broker reconnect attempts",
        )?;
        registry.register(Box::new(reconnect_attempts.clone()))?;

        Ok(Self {
            registry,
            envelopes_published,
            publish_skipped,
            messages_received,
            decode_failures,
            merge_outcomes,
            transport_connected,
            reconnect_attempts,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_published(&self, event_type: &str) {
        self.envelopes_published.with_label_values(&[event_type]).inc();
    }

    pub fn record_publish_skipped(&self, reason: &str) {
        self.publish_skipped.with_label_values(&[reason]).inc();
    }

    pub fn record_message_received(&self, view: &str) {
        self.messages_received.with_label_values(&[view]).inc();
    }

    pub fn record_decode_failure(&self, view: &str) {
        self.decode_failures.with_label_values(&[view]).inc();
    }

    pub fn record_merge(&self, view: &str, outcome: MergeOutcome) {
        self.merge_outcomes.with_label_values(&[view, outcome.as_str()]).inc();
    }

    pub fn set_transport_connected(&self, connected: bool) {
        self.transport_connected.set(i64::from(connected));
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.inc();
    }
}

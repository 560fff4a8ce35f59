use clap::Parser;
use std::time::Duration;

use crate::consumer::RoleView;
use crate::transport::mqtt::{parse_broker_url, DEFAULT_BROKER_URL, DEFAULT_TOPIC};
use crate::transport::TransportConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid broker URL: {0}")]
    BrokerUrl(String),

    #[error("Reconnect delay window is empty: min {min_ms}ms > max {max_ms}ms")]
    ReconnectWindow { min_ms: u64, max_ms: u64 },

    #[error("Keep-alive must be 0 (disabled) or at least 5 seconds, got {0}")]
    KeepAlive(u64),

    #[error("Topic must not be empty")]
    EmptyTopic,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "breakfast-notify")]
#[command(about = "Real-time order status notifications over MQTT")]
pub struct Config {
    #[arg(long, env = "MQTT_BROKER_URL", default_value = DEFAULT_BROKER_URL)]
    pub broker_url: String,

    #[arg(long, env = "MQTT_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Generated per connection when not set.
    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "MQTT_KEEP_ALIVE_SECS", default_value = "30")]
    pub keep_alive_secs: u64,

    #[arg(long, env = "MQTT_CONNECT_TIMEOUT_SECS", default_value = "4")]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "MQTT_RECONNECT_MIN_MS", default_value = "1000")]
    pub reconnect_min_ms: u64,

    #[arg(long, env = "MQTT_RECONNECT_MAX_MS", default_value = "30000")]
    pub reconnect_max_ms: u64,

    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    pub metrics_port: u16,

    /// View to keep live, e.g. kitchen, staff-pending, captain:<id>.
    /// Repeatable.
    #[arg(long = "view")]
    pub views: Vec<RoleView>,

    /// Drive a sample order lifecycle through the local order service.
    #[arg(long)]
    pub simulate: bool,
}

impl Config {
    /// Views to run; kitchen, pending and owner when none are given.
    pub fn views(&self) -> Vec<RoleView> {
        if self.views.is_empty() {
            vec![RoleView::Kitchen, RoleView::StaffPending, RoleView::Owner]
        } else {
            self.views.clone()
        }
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        parse_broker_url(&self.broker_url).map_err(|e| ConfigError::BrokerUrl(e.to_string()))?;

        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.reconnect_min_ms > self.reconnect_max_ms {
            return Err(ConfigError::ReconnectWindow {
                min_ms: self.reconnect_min_ms,
                max_ms: self.reconnect_max_ms,
            });
        }
        // rumqttc rejects keep-alive intervals below five seconds.
        if self.keep_alive_secs != 0 && self.keep_alive_secs < 5 {
            return Err(ConfigError::KeepAlive(self.keep_alive_secs));
        }

        Ok(TransportConfig {
            broker_url: self.broker_url.clone(),
            client_id: self.client_id.clone().filter(|id| !id.is_empty()),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            reconnect_min: Duration::from_millis(self.reconnect_min_ms),
            reconnect_max: Duration::from_millis(self.reconnect_max_ms),
            ..TransportConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["breakfast-notify"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_views_parse_and_default() {
        let config = parse(&["--view", "kitchen", "--view", "captain:cap-1"]);
        assert_eq!(
            config.views(),
            vec![
                RoleView::Kitchen,
                RoleView::Captain {
                    captain_id: "cap-1".to_string()
                }
            ]
        );

        let config = parse(&["--broker-url", "mqtt://localhost:1883"]);
        assert_eq!(config.views().len(), 3);
    }

    #[test]
    fn test_unknown_view_is_rejected() {
        assert!(Config::try_parse_from(["breakfast-notify", "--view", "cashier"]).is_err());
    }

    #[test]
    fn test_transport_config() {
        let config = parse(&[
            "--broker-url",
            "ws://localhost:8083/mqtt",
            "--client-id",
            "tab-1",
            "--reconnect-min-ms",
            "500",
            "--reconnect-max-ms",
            "8000",
        ]);
        let transport = config.transport_config().unwrap();

        assert_eq!(transport.broker_url, "ws://localhost:8083/mqtt");
        assert_eq!(transport.client_id.as_deref(), Some("tab-1"));
        assert_eq!(transport.reconnect_min, Duration::from_millis(500));
        assert_eq!(transport.reconnect_max, Duration::from_secs(8));
    }

    #[test]
    fn test_transport_config_validation() {
        let bad_url = parse(&["--broker-url", "http://localhost"]);
        assert!(matches!(bad_url.transport_config(), Err(ConfigError::BrokerUrl(_))));

        let inverted = parse(&[
            "--broker-url",
            "mqtt://localhost",
            "--reconnect-min-ms",
            "5000",
            "--reconnect-max-ms",
            "100",
        ]);
        assert!(matches!(
            inverted.transport_config(),
            Err(ConfigError::ReconnectWindow { .. })
        ));

        let short_keep_alive = parse(&["--broker-url", "mqtt://localhost", "--keep-alive-secs", "2"]);
        assert!(matches!(
            short_keep_alive.transport_config(),
            Err(ConfigError::KeepAlive(2))
        ));
    }
}

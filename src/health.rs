use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transport::ConnectionState;

// ============================================================================
// Connectivity Health
// ============================================================================
//
// Maps the broker connection state onto the non-blocking "real-time updates"
// indicator. CRUD keeps working while this reports unhealthy; only live
// update latency degrades.
//
// ============================================================================

/// Health status of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded(_) => "degraded",
            HealthStatus::Unhealthy(_) => "unhealthy",
        }
    }
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => HealthStatus::Healthy,
            ConnectionState::Connecting => {
                HealthStatus::Degraded("real-time updates reconnecting".to_string())
            }
            ConnectionState::Disconnected => {
                HealthStatus::Unhealthy("real-time updates disconnected".to_string())
            }
            ConnectionState::Closed => HealthStatus::Unhealthy("real-time updates closed".to_string()),
        }
    }
}

/// Health information for a component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
        }
    }

    pub fn broker(state: ConnectionState) -> Self {
        Self::new("mqtt", state.into())
    }
}

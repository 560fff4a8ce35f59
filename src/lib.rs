// ============================================================================
// Breakfast order notifications
// ============================================================================
//
// Pushes every committed order transition to every connected client over a
// single shared MQTT topic. Each client keeps role views (kitchen, staff,
// captain, customer, owner) current by filtering and merging full order
// snapshots locally.
//
//   order service ──commit──▶ publisher ──▶ transport ══broker══▶ transport
//                                                                   │
//                                      view state ◀── merge ◀── subscription
//
// ============================================================================

pub mod config;
pub mod consumer;
pub mod domain;
pub mod health;
pub mod messaging;
pub mod metrics;
pub mod transport;
pub mod utils;

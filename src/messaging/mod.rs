pub mod envelope;
pub mod publisher;

pub use envelope::{DecodeError, EventType, OrderEventEnvelope};
pub use publisher::{OrderEventPublisher, PublishOutcome};

// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderStatus, OrderItem, PartySummary)
// - Model (Order snapshot, the payload of every notification)
// - Errors (OrderError enum)
// - Store (OrderStore trait + in-memory implementation)
// - Service (commits transitions, then publishes the snapshot)
//
// ============================================================================

pub mod errors;
pub mod model;
pub mod service;
pub mod store;
pub mod value_objects;

// Re-export for convenience
pub use errors::*;
pub use model::*;
pub use service::*;
pub use store::*;
pub use value_objects::*;

// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// The order aggregate as the order-management service sees it. Everything
// the notification path needs to know about an order lives here.
//
// ============================================================================

pub mod order;

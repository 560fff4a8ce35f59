// ============================================================================
// Order Event Consumer
// ============================================================================
//
// Client side of the notification path. Every subscriber receives every
// order event on the shared topic and keeps only what its view needs.
//
// - view         - membership predicates and the built-in role views
// - state        - per-view ordered collection of order snapshots
// - merge        - pure decode → filter → merge pipeline
// - notification - alerts derived from merge results
// - revenue      - pickup / delivery takings over a view
// - subscription - binds a view to the transport with one worker task
//
// ============================================================================

pub mod merge;
pub mod notification;
pub mod revenue;
pub mod state;
pub mod subscription;
pub mod view;

pub use merge::{merge, merge_snapshot, process_message, seed, Applied, ConsumeError, MergeOutcome};
pub use notification::{NotificationKind, ViewNotification};
pub use revenue::RevenueSummary;
pub use state::OrderViewState;
pub use subscription::OrderViewSubscription;
pub use view::{MembershipPredicate, RoleView, ViewParseError};

//! Pure decision logic of the desk controller.
//!
//! This module contains:
//! - Ergonomic target derivation and the recommendation engine
//! - The sitting timer behind the stand-up reminder
//! - The poll-evaluation state machine for desk movement
//!
//! Nothing here performs I/O; the controller drives these types from its
//! timer and network callbacks.

pub mod movement;
pub mod recommend;
pub mod sitting;

// Re-export commonly used types
pub use movement::{
    MoveMonitor, MoveOutcome, PendingMove, PollReading, PollVerdict, ARRIVAL_TOLERANCE_CM,
    MAX_POLL_ATTEMPTS, STARTUP_GRACE_POLLS,
};
pub use recommend::{
    accept_target, dismiss_target, evaluate, evaluate_gated, sitting_reminder, ErgonomicTargets,
    Recommendation, RecommendationState, DEFAULT_MARGIN_CM,
};
pub use sitting::{SittingTimer, DEFAULT_SITTING_ALERT_SECS};

//! Ergodesk Agent - client-side controller for backend-managed sit/stand
//! desks.
//!
//! The backend owns all real state: pairing, bookings, persistence, and the
//! device link to the physical desks. This crate is the client half: it
//! derives ergonomic target heights for the user, recommends adjustments,
//! dispatches move commands, and monitors movement by polling the backend
//! until the desk arrives, stalls, or times out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Ergodesk Agent                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌──────────────┐    ┌────────────────┐   │
//! │  │ Recommend  │    │   Sitting    │    │  MoveMonitor   │   │
//! │  │  (pure)    │    │Timer (pure)  │    │    (pure)      │   │
//! │  └─────┬──────┘    └──────┬───────┘    └───────┬────────┘   │
//! │        └─────────┬────────┴────────────────────┘            │
//! │            ┌─────┴──────────┐      ┌───────────────┐        │
//! │            │ DeskController │─────▶│ UiEvent stream │       │
//! │            └─────┬──────────┘      └───────────────┘        │
//! │                  ▼                                           │
//! │          ┌───────────────┐      HTTP       ┌──────────┐     │
//! │          │ BackendClient │ ───────────────▶│ backend  │     │
//! │          └───────────────┘                 └──────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ergodesk_agent::core::{evaluate, ErgonomicTargets, RecommendationState};
//!
//! let targets = ErgonomicTargets::for_body_height(176);
//! assert_eq!(targets.sitting_height_cm, 71);
//!
//! let rec = evaluate(71, &targets);
//! assert_eq!(rec.state, RecommendationState::GoodSitting);
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod core;
pub mod events;
pub mod session;

// Re-export key types at crate root for convenience
pub use backend::{
    AdminDesk, BackendClient, BackendConfig, BackendError, BlockingBackendClient,
    CommandResponse, DeskStatus, Occupant,
};
pub use config::{Config, ConfigError};
pub use controller::DeskController;
pub use core::{
    ErgonomicTargets, MoveMonitor, MoveOutcome, PendingMove, Recommendation, RecommendationState,
    SittingTimer,
};
pub use events::{StatusBanner, StatusLevel, UiEvent};
pub use session::{DeskSession, DeskSessionStatus, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

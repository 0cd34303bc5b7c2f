//! Event stream from the controller to its rendering surface.
//!
//! The controller never draws anything. Every user-visible effect - popups,
//! the blocking overlay, pairing toggles, status banners - is emitted as a
//! `UiEvent` on a channel, and whatever front end is attached (the CLI's
//! watch loop, a test harness) renders them.

use crate::core::Recommendation;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::{Duration, Instant};

/// How long a status banner stays visible before auto-dismissing.
pub const BANNER_TTL: Duration = Duration::from_secs(4);

/// Overlay text while the move command is in flight.
pub const OVERLAY_SENDING: &str = "Sending command...";

/// Overlay text while polling for the desk to arrive.
pub const OVERLAY_MOVING: &str = "Moving desk... please wait";

/// Severity of a status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Info => "info",
            StatusLevel::Success => "success",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        }
    }
}

/// A transient status message. Renderers drop it once expired.
#[derive(Debug, Clone)]
pub struct StatusBanner {
    pub message: String,
    pub level: StatusLevel,
    shown_at: Instant,
}

impl StatusBanner {
    pub fn new(message: impl Into<String>, level: StatusLevel) -> Self {
        Self {
            message: message.into(),
            level,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.shown_at.elapsed() >= BANNER_TTL
    }
}

/// Everything the controller can ask a renderer to do.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A desk became the current selection.
    DeskSelected { desk_id: String },
    /// Pairing state of a desk changed; toggles pair/unpair buttons and
    /// move-control visibility.
    PairingChanged { desk_id: String, paired: bool },
    /// The displayed height control was synced to a device-reported height.
    HeightSynced { height_cm: i64 },
    /// Show a recommendation popup (replaces any showing one).
    PopupShown(Recommendation),
    /// Close the recommendation popup.
    PopupDismissed,
    /// A move wants confirmation before anything is sent.
    ConfirmRequested { desk_id: String, target_height_cm: i64 },
    /// Raise or retitle the blocking overlay.
    OverlayShown { text: &'static str },
    /// Drop the blocking overlay.
    OverlayHidden,
    /// Show a transient status banner.
    Status(StatusBanner),
}

/// Create the controller-to-renderer channel.
pub fn channel() -> (Sender<UiEvent>, Receiver<UiEvent>) {
    unbounded()
}

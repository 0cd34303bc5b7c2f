//! Ergonomic height recommendation engine.
//!
//! Pure decision logic: given the current desk height and the user's derived
//! target heights, produce a recommendation category, user-facing message,
//! and action button labels. Rendering and desk movement are the caller's
//! concern, so this module can be tested without any UI or network.

use serde::{Deserialize, Serialize};

/// Divisor mapping body height to sitting desk height.
const SITTING_DIVISOR: f64 = 2.48;

/// Divisor mapping body height to standing desk height.
const STANDING_DIVISOR: f64 = 1.58;

/// Default tolerance band around a target height, in cm.
pub const DEFAULT_MARGIN_CM: i64 = 4;

/// Placeholder daily sitting total reported by the reminder until the
/// backend exposes accumulated pairing time.
const PLACEHOLDER_SITTING_HOURS: f64 = 4.2;

/// Ergonomic target desk heights derived from the user's body height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErgonomicTargets {
    /// Recommended desk height while seated, in cm
    pub sitting_height_cm: i64,
    /// Recommended desk height while standing, in cm
    pub standing_height_cm: i64,
    /// Tolerance band around each target, in cm
    pub margin_cm: i64,
}

impl ErgonomicTargets {
    /// Derive targets from a body height in cm.
    ///
    /// Standing height is always strictly greater than sitting height for
    /// positive body heights under these divisors.
    pub fn for_body_height(body_height_cm: u32) -> Self {
        Self {
            sitting_height_cm: (f64::from(body_height_cm) / SITTING_DIVISOR).round() as i64,
            standing_height_cm: (f64::from(body_height_cm) / STANDING_DIVISOR).round() as i64,
            margin_cm: DEFAULT_MARGIN_CM,
        }
    }

    /// Override the tolerance band.
    pub fn with_margin(mut self, margin_cm: i64) -> Self {
        self.margin_cm = margin_cm;
        self
    }
}

/// Category of an active recommendation popup.
///
/// All variants except `SittingReminder` are derived from the current height;
/// the reminder is timer-driven and overrides the height-derived state until
/// dismissed. "No popup showing" is modeled as `Option::None` by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationState {
    TooLow,
    GoodSitting,
    StandingChoice,
    TooHigh,
    SittingReminder,
}

/// A recommendation ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub state: RecommendationState,
    pub message: String,
    /// Label of the accept (left) button
    pub accept_label: &'static str,
    /// Label of the dismiss (right) button; `None` hides it
    pub dismiss_label: Option<&'static str>,
}

impl Recommendation {
    /// Whether this recommendation arms the sitting timer.
    pub fn arms_sitting_timer(&self) -> bool {
        self.state == RecommendationState::GoodSitting
    }
}

/// Evaluate the current height against the targets.
///
/// Branches are checked in a fixed order; the first match wins:
/// below the sitting band, inside it, up to the standing band's upper edge,
/// above it. Both band bounds are inclusive.
pub fn evaluate(height_cm: i64, targets: &ErgonomicTargets) -> Recommendation {
    let sit = targets.sitting_height_cm;
    let stand = targets.standing_height_cm;
    let margin = targets.margin_cm;

    if height_cm < sit - margin {
        Recommendation {
            state: RecommendationState::TooLow,
            message: format!(
                "Too low. Recommended sitting height: {}-{} cm",
                sit - margin,
                sit + margin
            ),
            accept_label: "Adjust",
            dismiss_label: Some("Ignore"),
        }
    } else if height_cm <= sit + margin {
        Recommendation {
            state: RecommendationState::GoodSitting,
            message: "Good sitting height.".to_string(),
            accept_label: "OK",
            dismiss_label: None,
        }
    } else if height_cm <= stand + margin {
        Recommendation {
            state: RecommendationState::StandingChoice,
            message: "Near standing height. Choose a position:".to_string(),
            accept_label: "Sitting",
            dismiss_label: Some("Standing"),
        }
    } else {
        Recommendation {
            state: RecommendationState::TooHigh,
            message: format!(
                "Too high. Recommended standing height: {}-{} cm",
                stand - margin,
                stand + margin
            ),
            accept_label: "Adjust",
            dismiss_label: Some("Ignore"),
        }
    }
}

/// Gated evaluation: recommendations only apply while the toggle is on and
/// at least one desk session is booked or paired. Returns `None` when the
/// gate is closed, which callers treat as "dismiss any showing popup and
/// reset the sitting timer".
pub fn evaluate_gated(
    height_cm: i64,
    targets: &ErgonomicTargets,
    enabled: bool,
    has_active_desk: bool,
) -> Option<Recommendation> {
    if !enabled || !has_active_desk {
        return None;
    }
    Some(evaluate(height_cm, targets))
}

/// The timer-driven sitting reminder, shown over any height-derived state.
pub fn sitting_reminder() -> Recommendation {
    Recommendation {
        state: RecommendationState::SittingReminder,
        message: format!(
            "Consider standing more: you have been sitting for {PLACEHOLDER_SITTING_HOURS:.1} hours today."
        ),
        accept_label: "Stand up",
        dismiss_label: Some("Cancel"),
    }
}

/// Height the accept (left) button moves the desk to, if any.
pub fn accept_target(state: RecommendationState, targets: &ErgonomicTargets) -> Option<i64> {
    match state {
        RecommendationState::TooLow | RecommendationState::StandingChoice => {
            Some(targets.sitting_height_cm)
        }
        RecommendationState::TooHigh | RecommendationState::SittingReminder => {
            Some(targets.standing_height_cm)
        }
        RecommendationState::GoodSitting => None,
    }
}

/// Height the dismiss (right) button moves the desk to, if any.
///
/// Only the standing-choice popup moves on dismiss ("Standing"); every other
/// state's dismiss closes the popup with no height change.
pub fn dismiss_target(state: RecommendationState, targets: &ErgonomicTargets) -> Option<i64> {
    match state {
        RecommendationState::StandingChoice => Some(targets.standing_height_cm),
        _ => None,
    }
}

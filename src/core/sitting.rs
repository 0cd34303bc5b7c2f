//! Sitting timer: a 1 Hz counter that raises a stand-up reminder after a
//! continuous stretch at a good sitting height.
//!
//! The timer holds no schedule of its own; the controller's ticker task
//! drives it once per second. That keeps the state pure and testable.

/// Default seconds of continuous sitting before the reminder fires.
/// Deliberately short for demo setups; production deployments override it
/// through the agent config.
pub const DEFAULT_SITTING_ALERT_SECS: u32 = 10;

/// Countdown state for the stand-up reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SittingTimer {
    threshold_secs: u32,
    elapsed_secs: u32,
    armed: bool,
    fired: bool,
}

impl SittingTimer {
    pub fn new(threshold_secs: u32) -> Self {
        Self {
            threshold_secs,
            elapsed_secs: 0,
            armed: false,
            fired: false,
        }
    }

    /// Arm the timer. A no-op while already armed, so re-entering the good
    /// sitting state does not restart an ongoing streak.
    pub fn start(&mut self) {
        if self.armed {
            return;
        }
        self.armed = true;
        self.elapsed_secs = 0;
        self.fired = false;
    }

    /// Disarm and zero the timer.
    pub fn reset(&mut self) {
        self.armed = false;
        self.elapsed_secs = 0;
        self.fired = false;
    }

    /// Advance one second. Returns `true` exactly once per streak, when the
    /// elapsed time reaches the threshold.
    pub fn tick(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.elapsed_secs += 1;
        if !self.fired && self.elapsed_secs == self.threshold_secs {
            self.fired = true;
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }
}

impl Default for SittingTimer {
    fn default() -> Self {
        Self::new(DEFAULT_SITTING_ALERT_SECS)
    }
}

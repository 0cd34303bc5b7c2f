//! Movement monitoring: the poll-evaluation state machine behind a desk
//! move command.
//!
//! After the backend accepts a move, the desk travels on its own and the
//! client can only observe progress through periodic status polls. The
//! `MoveMonitor` consumes one poll reading per tick and decides whether the
//! move is still in progress or has reached a terminal outcome. It is pure
//! state; the controller owns the actual timer and HTTP calls.

use chrono::{DateTime, Utc};

/// Height tolerance for declaring a move complete, in cm.
pub const ARRIVAL_TOLERANCE_CM: i64 = 1;

/// Polls to wait before trusting a "not moving" report. A status read can
/// race the motor's startup, so the first two reports are not conclusive.
pub const STARTUP_GRACE_POLLS: u32 = 2;

/// Poll attempt budget, one attempt per second.
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// A movement request awaiting confirmation or execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub desk_id: String,
    pub target_height_cm: i64,
    pub requested_at: DateTime<Utc>,
}

impl PendingMove {
    pub fn new(desk_id: impl Into<String>, target_height_cm: i64) -> Self {
        Self {
            desk_id: desk_id.into(),
            target_height_cm,
            requested_at: Utc::now(),
        }
    }
}

/// The fields of one status poll relevant to movement monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReading {
    pub current_height_cm: Option<i64>,
    pub is_moving: Option<bool>,
}

/// Terminal outcome of a monitored move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The desk arrived within tolerance of the target.
    Reached { final_height_cm: i64 },
    /// The motor stopped short of the target.
    Stalled { final_height_cm: Option<i64> },
    /// The attempt budget ran out before a conclusive report.
    TimedOut { last_height_cm: Option<i64> },
}

impl MoveOutcome {
    /// The height to sync the display to, when one was obtained.
    pub fn final_height_cm(&self) -> Option<i64> {
        match *self {
            MoveOutcome::Reached { final_height_cm } => Some(final_height_cm),
            MoveOutcome::Stalled { final_height_cm } => final_height_cm,
            MoveOutcome::TimedOut { last_height_cm } => last_height_cm,
        }
    }
}

/// Result of feeding one poll into the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// Keep polling.
    Continue,
    /// The move finished; stop the poll loop and apply UI effects once.
    Terminal(MoveOutcome),
    /// A report arrived after the move already finished. Duplicate or late
    /// readings must not re-trigger terminal effects.
    AlreadyDone,
}

/// Poll-evaluation state for a single move request.
#[derive(Debug, Clone)]
pub struct MoveMonitor {
    target_height_cm: i64,
    max_attempts: u32,
    attempts: u32,
    finished: bool,
}

impl MoveMonitor {
    pub fn new(target_height_cm: i64) -> Self {
        Self::with_budget(target_height_cm, MAX_POLL_ATTEMPTS)
    }

    pub fn with_budget(target_height_cm: i64, max_attempts: u32) -> Self {
        Self {
            target_height_cm,
            max_attempts,
            attempts: 0,
            finished: false,
        }
    }

    /// Feed one poll. `None` records a failed status fetch: it still
    /// consumes an attempt but can only end the move through the timeout
    /// budget. Exactly one terminal condition fires per move; arrival is
    /// checked before stall, stall before timeout.
    pub fn observe(&mut self, reading: Option<PollReading>) -> PollVerdict {
        if self.finished {
            return PollVerdict::AlreadyDone;
        }
        self.attempts += 1;

        if let Some(reading) = reading {
            if let Some(height) = reading.current_height_cm {
                if (height - self.target_height_cm).abs() <= ARRIVAL_TOLERANCE_CM {
                    return self.finish(MoveOutcome::Reached {
                        final_height_cm: height,
                    });
                }
            }
            if reading.is_moving == Some(false) && self.attempts > STARTUP_GRACE_POLLS {
                return self.finish(MoveOutcome::Stalled {
                    final_height_cm: reading.current_height_cm,
                });
            }
        }

        if self.attempts >= self.max_attempts {
            return self.finish(MoveOutcome::TimedOut {
                last_height_cm: reading.and_then(|r| r.current_height_cm),
            });
        }

        PollVerdict::Continue
    }

    fn finish(&mut self, outcome: MoveOutcome) -> PollVerdict {
        self.finished = true;
        PollVerdict::Terminal(outcome)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn target_height_cm(&self) -> i64 {
        self.target_height_cm
    }
}

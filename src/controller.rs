//! The desk controller: wires the pure core to the backend client.
//!
//! All sequencing lives here - desk selection, pairing dispatches, the
//! move-confirmation flow with its polling loop, and the sitting ticker.
//! Rendering is a subscriber: every user-visible effect goes out as a
//! `UiEvent` and the controller never touches a display surface.
//!
//! Concurrency model: one tokio runtime, suspension only at HTTP calls and
//! timer ticks. The poll loop for a move is a single task that awaits each
//! status response before the next tick, so polls for one move are strictly
//! serialized. Each move is tagged with a monotonically increasing epoch;
//! a superseding move bumps the epoch, and callbacks from retired loops are
//! discarded before they can touch the UI.

use crate::backend::{BackendClient, DeskStatus};
use crate::config::Config;
use crate::core::{
    accept_target, dismiss_target, evaluate_gated, sitting_reminder, ErgonomicTargets,
    MoveMonitor, MoveOutcome, PendingMove, PollReading, PollVerdict, Recommendation,
    RecommendationState, SittingTimer,
};
use crate::events::{StatusBanner, StatusLevel, UiEvent, OVERLAY_MOVING, OVERLAY_SENDING};
use crate::session::SessionState;
use chrono::NaiveDateTime;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Seconds between status polls while a move is monitored.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Seconds between sitting-timer ticks.
const TICKER_INTERVAL: Duration = Duration::from_secs(1);

/// Client-side controller for one desk session.
#[derive(Clone)]
pub struct DeskController {
    backend: Arc<BackendClient>,
    targets: ErgonomicTargets,
    session: Arc<Mutex<SessionState>>,
    sitting: Arc<Mutex<SittingTimer>>,
    popup: Arc<Mutex<Option<Recommendation>>>,
    pending_move: Arc<Mutex<Option<PendingMove>>>,
    move_epoch: Arc<AtomicU64>,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    ticker_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    events: Sender<UiEvent>,
}

impl DeskController {
    pub fn new(backend: BackendClient, config: &Config, events: Sender<UiEvent>) -> Self {
        Self {
            backend: Arc::new(backend),
            targets: config.targets(),
            session: Arc::new(Mutex::new(SessionState::new(config.recommendations_enabled))),
            sitting: Arc::new(Mutex::new(SittingTimer::new(config.sitting_alert_secs))),
            popup: Arc::new(Mutex::new(None)),
            pending_move: Arc::new(Mutex::new(None)),
            move_epoch: Arc::new(AtomicU64::new(0)),
            poll_task: Arc::new(Mutex::new(None)),
            ticker_task: Arc::new(Mutex::new(None)),
            refresh_task: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn targets(&self) -> ErgonomicTargets {
        self.targets
    }

    pub async fn selected_desk(&self) -> Option<String> {
        self.session.lock().await.selected_desk().map(String::from)
    }

    pub async fn displayed_height(&self) -> Option<i64> {
        self.session.lock().await.displayed_height_cm()
    }

    pub async fn is_paired(&self, desk_id: &str) -> bool {
        self.session.lock().await.is_paired(desk_id)
    }

    pub async fn current_popup(&self) -> Option<Recommendation> {
        self.popup.lock().await.clone()
    }

    pub async fn pending_move(&self) -> Option<PendingMove> {
        self.pending_move.lock().await.clone()
    }

    // ---- desk selection / pairing ----

    /// Select a desk and refresh its live status from the backend. Pairing
    /// enablement and control visibility always come from the response,
    /// never from the local cache alone.
    pub async fn select_desk(&self, desk_id: &str) {
        self.session.lock().await.select_desk(desk_id);
        self.emit(UiEvent::DeskSelected {
            desk_id: desk_id.to_string(),
        });

        match self.backend.desk_status(desk_id).await {
            Ok(status) => self.apply_status(desk_id, &status, true).await,
            Err(e) => tracing::warn!(desk_id, error = %e, "user-status check failed"),
        }
    }

    /// Pair the current user with the selected desk.
    pub async fn pair(&self) {
        let Some(desk_id) = self.selected_desk().await else {
            self.banner("No desk selected.", StatusLevel::Error);
            return;
        };

        match self.backend.pair(&desk_id).await {
            Ok(resp) => {
                let level = if resp.success {
                    StatusLevel::Success
                } else {
                    StatusLevel::Error
                };
                self.banner(resp.message.clone(), level);
                if resp.success {
                    self.session.lock().await.mark_paired(&desk_id);
                    self.emit(UiEvent::PairingChanged {
                        desk_id,
                        paired: true,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "pair request failed");
                self.banner("Pair request failed.", StatusLevel::Error);
            }
        }
    }

    /// Unpair the current user from the selected desk.
    pub async fn unpair(&self) {
        let Some(desk_id) = self.selected_desk().await else {
            self.banner("No desk selected.", StatusLevel::Error);
            return;
        };

        match self.backend.unpair().await {
            Ok(resp) => {
                let level = if resp.success {
                    StatusLevel::Success
                } else {
                    StatusLevel::Error
                };
                self.banner(resp.message.clone(), level);
                if resp.success {
                    self.session.lock().await.mark_unpaired(&desk_id);
                    self.emit(UiEvent::PairingChanged {
                        desk_id,
                        paired: false,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "unpair request failed");
                self.banner("Unpair request failed.", StatusLevel::Error);
            }
        }
    }

    /// Record a local booking for a desk, which opens the recommendation
    /// gate without granting move control.
    pub async fn book(&self, desk_id: &str, start: NaiveDateTime, end: NaiveDateTime) {
        self.session.lock().await.book(desk_id, start, end);
        self.banner(
            format!("Desk {desk_id} booked from {start} to {end}"),
            StatusLevel::Info,
        );
    }

    // ---- height changes / recommendations ----

    /// Handle a user-driven height change (slider release). Requests a move
    /// when the selected desk is paired, then re-evaluates the
    /// recommendation gate.
    pub async fn height_changed(&self, height_cm: i64) {
        let (paired_selected, enabled, has_active) = {
            let mut session = self.session.lock().await;
            session.set_displayed_height(height_cm);
            (
                session.selected_desk_paired(),
                session.recommendations_enabled(),
                session.has_active_desk(),
            )
        };

        if paired_selected {
            self.request_move(height_cm).await;
        }

        match evaluate_gated(height_cm, &self.targets, enabled, has_active) {
            None => {
                self.close_popup().await;
                self.sitting.lock().await.reset();
            }
            Some(rec) => {
                if rec.arms_sitting_timer() {
                    self.sitting.lock().await.start();
                } else {
                    self.sitting.lock().await.reset();
                }
                *self.popup.lock().await = Some(rec.clone());
                self.emit(UiEvent::PopupShown(rec));
            }
        }
    }

    /// Handle a profile pick (a preset height button). Only meaningful when
    /// the selected desk is paired.
    pub async fn profile_selected(&self, height_cm: i64) {
        if self.session.lock().await.selected_desk_paired() {
            self.request_move(height_cm).await;
        }
    }

    /// Accept (left) button of the showing popup.
    pub async fn accept_popup(&self) {
        let Some(rec) = self.popup.lock().await.take() else {
            return;
        };
        self.emit(UiEvent::PopupDismissed);
        if rec.state == RecommendationState::SittingReminder {
            self.sitting.lock().await.reset();
        }
        if let Some(target) = accept_target(rec.state, &self.targets) {
            self.request_move(target).await;
        }
    }

    /// Dismiss (right) button of the showing popup. For the standing-choice
    /// popup this is "Standing" and moves the desk; everywhere else it just
    /// closes.
    pub async fn dismiss_popup(&self) {
        let Some(rec) = self.popup.lock().await.take() else {
            return;
        };
        self.emit(UiEvent::PopupDismissed);
        if rec.state == RecommendationState::SittingReminder {
            self.sitting.lock().await.reset();
        }
        if let Some(target) = dismiss_target(rec.state, &self.targets) {
            self.request_move(target).await;
        }
    }

    /// Flip the recommendations toggle. Turning it off dismisses any popup
    /// and resets the sitting timer.
    pub async fn set_recommendations_enabled(&self, enabled: bool) {
        self.session
            .lock()
            .await
            .set_recommendations_enabled(enabled);
        if !enabled {
            self.close_popup().await;
            self.sitting.lock().await.reset();
        }
    }

    // ---- movement orchestration ----

    /// Ask for confirmation of a move to `target_height_cm` on the selected
    /// desk. A new request supersedes any pending one.
    pub async fn request_move(&self, target_height_cm: i64) {
        let Some(desk_id) = self.selected_desk().await else {
            return;
        };
        if !self.session.lock().await.is_paired(&desk_id) {
            return;
        }
        let mv = PendingMove::new(desk_id.clone(), target_height_cm);
        *self.pending_move.lock().await = Some(mv);
        self.emit(UiEvent::ConfirmRequested {
            desk_id,
            target_height_cm,
        });
    }

    /// Confirm the pending move and dispatch it.
    pub async fn confirm_move(&self) {
        let Some(mv) = self.pending_move.lock().await.take() else {
            return;
        };
        self.execute_move(mv).await;
    }

    /// Drop the pending move without dispatching.
    pub async fn cancel_move(&self) {
        self.pending_move.lock().await.take();
    }

    async fn execute_move(&self, mv: PendingMove) {
        self.emit(UiEvent::OverlayShown {
            text: OVERLAY_SENDING,
        });

        match self
            .backend
            .set_desk_height(&mv.desk_id, mv.target_height_cm)
            .await
        {
            Ok(resp) if resp.success => self.start_polling(mv).await,
            Ok(resp) => {
                // backend refused the command; its message goes out verbatim
                self.emit(UiEvent::OverlayHidden);
                self.banner(resp.message, StatusLevel::Error);
            }
            Err(e) => {
                tracing::error!(desk_id = %mv.desk_id, error = %e, "height command failed");
                self.emit(UiEvent::OverlayHidden);
                self.banner("Connection failed", StatusLevel::Error);
            }
        }
    }

    async fn start_polling(&self, mv: PendingMove) {
        // Supersede any in-flight poll loop: bump the epoch first so its
        // callbacks retire, then abort the task.
        let epoch = self.move_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.poll_task.lock().await.take() {
            previous.abort();
        }

        self.emit(UiEvent::OverlayShown {
            text: OVERLAY_MOVING,
        });

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut monitor = MoveMonitor::new(mv.target_height_cm);
            let mut ticks = time::interval(POLL_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await; // the first tick completes immediately

            loop {
                ticks.tick().await;
                if controller.move_epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                let reading = match controller.backend.desk_status(&mv.desk_id).await {
                    Ok(status) => Some(PollReading {
                        current_height_cm: status.current_height,
                        is_moving: status.is_moving,
                    }),
                    Err(e) => {
                        tracing::warn!(desk_id = %mv.desk_id, error = %e, "status poll failed");
                        None
                    }
                };
                match monitor.observe(reading) {
                    PollVerdict::Continue => {}
                    PollVerdict::Terminal(outcome) => {
                        controller.finish_move(epoch, &mv, outcome).await;
                        return;
                    }
                    PollVerdict::AlreadyDone => return,
                }
            }
        });

        *self.poll_task.lock().await = Some(handle);
    }

    /// Apply the terminal effects of a move exactly once. Stale epochs are
    /// callbacks from superseded loops and are discarded.
    async fn finish_move(&self, epoch: u64, mv: &PendingMove, outcome: MoveOutcome) {
        if self.move_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.emit(UiEvent::OverlayHidden);

        let (message, level) = match outcome {
            MoveOutcome::Reached { .. } => (
                format!("Desk reached {}cm", mv.target_height_cm),
                StatusLevel::Success,
            ),
            MoveOutcome::Stalled {
                final_height_cm: Some(height),
            } => (format!("Desk stopped at {height}cm"), StatusLevel::Warning),
            MoveOutcome::Stalled {
                final_height_cm: None,
            } => (
                "Desk stopped before reaching the target".to_string(),
                StatusLevel::Warning,
            ),
            // a timeout is a distinct non-fatal outcome, not a failure of
            // the desk itself
            MoveOutcome::TimedOut { .. } => {
                ("Movement timed out".to_string(), StatusLevel::Error)
            }
        };
        self.banner(message, level);

        // sync the display to where the desk actually ended up
        if let Some(height) = outcome.final_height_cm() {
            self.session.lock().await.set_displayed_height(height);
            self.emit(UiEvent::HeightSynced { height_cm: height });
        }
    }

    // ---- background tasks ----

    /// Start the 1 Hz sitting ticker. Starting twice is a no-op.
    pub async fn start_sitting_ticker(&self) {
        let mut guard = self.ticker_task.lock().await;
        if guard.is_some() {
            return;
        }
        let controller = self.clone();
        *guard = Some(tokio::spawn(async move {
            let mut ticks = time::interval(TICKER_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let fired = controller.sitting.lock().await.tick();
                if fired {
                    controller.show_sitting_reminder().await;
                }
            }
        }));
    }

    /// Start periodic status refresh of the selected desk. Starting twice
    /// is a no-op.
    pub async fn start_status_refresh(&self, every: Duration) {
        let mut guard = self.refresh_task.lock().await;
        if guard.is_some() {
            return;
        }
        let controller = self.clone();
        *guard = Some(tokio::spawn(async move {
            let mut ticks = time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                controller.refresh_selected().await;
            }
        }));
    }

    /// Re-fetch the selected desk's live status and fold it into the cache.
    /// Refresh failures are quiet; the next tick tries again.
    pub async fn refresh_selected(&self) {
        let Some(desk_id) = self.selected_desk().await else {
            return;
        };
        match self.backend.desk_status(&desk_id).await {
            Ok(status) => self.apply_status(&desk_id, &status, false).await,
            Err(e) => tracing::debug!(desk_id = %desk_id, error = %e, "status refresh failed"),
        }
    }

    /// Stop all background tasks. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.move_epoch.fetch_add(1, Ordering::SeqCst);
        for slot in [&self.poll_task, &self.ticker_task, &self.refresh_task] {
            if let Some(handle) = slot.lock().await.take() {
                handle.abort();
            }
        }
    }

    // ---- internals ----

    async fn apply_status(&self, desk_id: &str, status: &DeskStatus, selection: bool) {
        let was_paired = {
            let mut session = self.session.lock().await;
            let was_paired = session.is_paired(desk_id);
            session.record_status(desk_id, status);
            if selection && status.is_paired {
                if let Some(height) = status.current_height {
                    session.set_displayed_height(height);
                }
            }
            was_paired
        };

        if selection {
            // a fresh selection always reports enablement
            if status.is_paired {
                if let Some(height) = status.current_height {
                    self.emit(UiEvent::HeightSynced { height_cm: height });
                }
            }
            self.emit(UiEvent::PairingChanged {
                desk_id: desk_id.to_string(),
                paired: status.is_paired,
            });
        } else if was_paired != status.is_paired {
            self.emit(UiEvent::PairingChanged {
                desk_id: desk_id.to_string(),
                paired: status.is_paired,
            });
        }
    }

    async fn show_sitting_reminder(&self) {
        let reminder = sitting_reminder();
        *self.popup.lock().await = Some(reminder.clone());
        self.emit(UiEvent::PopupShown(reminder));
    }

    async fn close_popup(&self) {
        if self.popup.lock().await.take().is_some() {
            self.emit(UiEvent::PopupDismissed);
        }
    }

    fn banner(&self, message: impl Into<String>, level: StatusLevel) {
        self.emit(UiEvent::Status(StatusBanner::new(message, level)));
    }

    fn emit(&self, event: UiEvent) {
        // a dropped receiver just means no renderer is attached
        let _ = self.events.send(event);
    }
}

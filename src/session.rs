//! Client-side session state for desk selection, pairing, and booking.
//!
//! One `SessionState` is owned by the controller and read through explicit
//! accessors. It is a read-through cache of backend-owned state: it goes
//! stale the moment another client or the physical desk changes anything,
//! and is refreshed from status fetches rather than trusted.

use crate::backend::DeskStatus;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the current user holds a desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskSessionStatus {
    /// Reserved locally for a time window; the desk is not under control.
    Booked,
    /// Paired via the backend; move controls are available.
    Paired,
}

/// A local booking window. Bookings live only in this session, mirroring
/// the booking form's page-local behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Cached view of one desk the user holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskSession {
    pub desk_id: String,
    pub status: DeskSessionStatus,
    pub current_height_cm: Option<i64>,
    pub is_moving: bool,
    /// When this session entry was (last) established
    pub since: DateTime<Utc>,
    pub booking: Option<BookingWindow>,
}

/// The controller's session-wide state.
#[derive(Debug, Clone)]
pub struct SessionState {
    desks: HashMap<String, DeskSession>,
    selected_desk: Option<String>,
    recommendations_enabled: bool,
    /// Height shown on the control surface; synced from the device on
    /// selection and after each move
    displayed_height_cm: Option<i64>,
}

impl SessionState {
    pub fn new(recommendations_enabled: bool) -> Self {
        Self {
            desks: HashMap::new(),
            selected_desk: None,
            recommendations_enabled,
            displayed_height_cm: None,
        }
    }

    pub fn select_desk(&mut self, desk_id: &str) {
        self.selected_desk = Some(desk_id.to_string());
    }

    pub fn selected_desk(&self) -> Option<&str> {
        self.selected_desk.as_deref()
    }

    /// Apply a fresh status fetch for a desk. Pairing reported by the
    /// backend always wins over whatever this cache held; a desk no longer
    /// paired keeps its local booking, if any, and is otherwise dropped.
    pub fn record_status(&mut self, desk_id: &str, status: &DeskStatus) {
        if status.is_paired {
            let entry = self
                .desks
                .entry(desk_id.to_string())
                .or_insert_with(|| DeskSession {
                    desk_id: desk_id.to_string(),
                    status: DeskSessionStatus::Paired,
                    current_height_cm: None,
                    is_moving: false,
                    since: Utc::now(),
                    booking: None,
                });
            entry.status = DeskSessionStatus::Paired;
            entry.current_height_cm = status.current_height;
            entry.is_moving = status.is_moving.unwrap_or(false);
        } else if let Some(entry) = self.desks.get_mut(desk_id) {
            if entry.booking.is_some() {
                entry.status = DeskSessionStatus::Booked;
                entry.current_height_cm = None;
                entry.is_moving = false;
            } else {
                self.desks.remove(desk_id);
            }
        }
    }

    /// Flip the cache after a successful pair dispatch.
    pub fn mark_paired(&mut self, desk_id: &str) {
        let entry = self
            .desks
            .entry(desk_id.to_string())
            .or_insert_with(|| DeskSession {
                desk_id: desk_id.to_string(),
                status: DeskSessionStatus::Paired,
                current_height_cm: None,
                is_moving: false,
                since: Utc::now(),
                booking: None,
            });
        entry.status = DeskSessionStatus::Paired;
        entry.since = Utc::now();
    }

    /// Drop the cache entry after a successful unpair dispatch.
    pub fn mark_unpaired(&mut self, desk_id: &str) {
        self.desks.remove(desk_id);
    }

    /// Record a local booking for a desk.
    pub fn book(&mut self, desk_id: &str, start: NaiveDateTime, end: NaiveDateTime) {
        self.desks.insert(
            desk_id.to_string(),
            DeskSession {
                desk_id: desk_id.to_string(),
                status: DeskSessionStatus::Booked,
                current_height_cm: None,
                is_moving: false,
                since: Utc::now(),
                booking: Some(BookingWindow { start, end }),
            },
        );
    }

    pub fn cancel_booking(&mut self, desk_id: &str) {
        if let Some(entry) = self.desks.get(desk_id) {
            if entry.status == DeskSessionStatus::Booked {
                self.desks.remove(desk_id);
            }
        }
    }

    pub fn desk(&self, desk_id: &str) -> Option<&DeskSession> {
        self.desks.get(desk_id)
    }

    pub fn desks(&self) -> impl Iterator<Item = &DeskSession> {
        self.desks.values()
    }

    /// The recommendation gate: at least one desk is booked or paired.
    pub fn has_active_desk(&self) -> bool {
        !self.desks.is_empty()
    }

    pub fn is_paired(&self, desk_id: &str) -> bool {
        self.desks
            .get(desk_id)
            .map(|d| d.status == DeskSessionStatus::Paired)
            .unwrap_or(false)
    }

    /// Whether move controls apply: the selected desk is paired.
    pub fn selected_desk_paired(&self) -> bool {
        self.selected_desk
            .as_deref()
            .map(|id| self.is_paired(id))
            .unwrap_or(false)
    }

    pub fn recommendations_enabled(&self) -> bool {
        self.recommendations_enabled
    }

    pub fn set_recommendations_enabled(&mut self, enabled: bool) {
        self.recommendations_enabled = enabled;
    }

    pub fn displayed_height_cm(&self) -> Option<i64> {
        self.displayed_height_cm
    }

    pub fn set_displayed_height(&mut self, height_cm: i64) {
        self.displayed_height_cm = Some(height_cm);
    }
}

//! Fixed-window admission control
use std::collections::HashMap;
use std::time::Instant;

use crate::connection::ConnectionId;
use crate::settings::AdmissionSettings;

/// Per-connection counter for the current window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateWindow {
    fn open(now: Instant, settings: &AdmissionSettings) -> Self {
        Self {
            count: 1,
            reset_at: now + settings.window,
        }
    }

    /// A window stays live up to and including its reset instant
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// Each connection that has tried to send gets a `RateWindow` in here.
///
/// This is a fixed window rather than a sliding one: a client can land up to
/// twice the per-window limit across a window edge. Records are only removed
/// by `release`, so the map is bounded by the live connection set as long as
/// every disconnect releases its connection.
#[derive(Clone, Debug)]
pub struct AdmissionController {
    settings: AdmissionSettings,
    cache: HashMap<ConnectionId, RateWindow>,
}

impl AdmissionController {
    pub fn new(settings: AdmissionSettings) -> Self {
        Self {
            settings,
            cache: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn window(&self, connection_id: ConnectionId) -> Option<&RateWindow> {
        self.cache.get(&connection_id)
    }

    /// Admissions left in the current window; a full quota if there is no live window
    pub fn remaining(&self, connection_id: ConnectionId, now: Instant) -> u32 {
        match self.cache.get(&connection_id) {
            Some(window) if !window.is_expired(now) => self
                .settings
                .max_messages_per_window
                .saturating_sub(window.count),
            _ => self.settings.max_messages_per_window,
        }
    }

    /// Count this attempt against the connection's window if it is allowed.
    /// Rejected attempts leave the window untouched.
    pub fn try_admit(&mut self, connection_id: ConnectionId, now: Instant) -> bool {
        let max_messages = self.settings.max_messages_per_window;
        if let Some(window) = self.cache.get_mut(&connection_id) {
            if !window.is_expired(now) {
                if window.count >= max_messages {
                    return false;
                }
                window.count += 1;
                return true;
            }
        }
        // No record yet, or the old window has lapsed
        self.cache
            .insert(connection_id, RateWindow::open(now, &self.settings));
        true
    }

    /// Forget the connection's window; returns whether one existed
    pub fn release(&mut self, connection_id: ConnectionId) -> bool {
        self.cache.remove(&connection_id).is_some()
    }
}

//! # Session Context
//!
//! Bookkeeping owned by the state machine: timers, distance, last position
//! and the active log handle. Mutated only through the tracker while it
//! holds the shared lock.

use std::time::Duration;

use super::geo::haversine_m;
use super::state::{Effect, Phase, SessionEvent, SessionState};
use crate::sensors::Fix;
use crate::storage::LogHandle;

/// Point admission policy for the log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    /// Minimum distance from the previous admitted point (meters).
    pub min_distance_m: f64,
    /// With `min_distance_m == 0`, also admit points at zero distance.
    pub admit_stationary: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            min_distance_m: 5.0,
            admit_stationary: false,
        }
    }
}

/// State of the current (or last) recording session
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    phase: Phase,
    session_start: Duration,
    last_motion: Duration,
    accumulated_pause: Duration,
    total_distance_m: f64,
    last_position: Option<(f64, f64)>,
    active_log: Option<LogHandle>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        self.phase.state()
    }

    pub fn manual_pause(&self) -> bool {
        self.phase.is_manual_pause()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn last_position(&self) -> Option<(f64, f64)> {
        self.last_position
    }

    pub fn active_log(&self) -> Option<&LogHandle> {
        self.active_log.as_ref()
    }

    pub fn accumulated_pause(&self) -> Duration {
        self.accumulated_pause
    }

    /// Resets session-scoped fields for a new session writing to `log`.
    pub fn begin(&mut self, log: LogHandle, now: Duration) {
        self.phase = Phase::Recording;
        self.session_start = now;
        self.last_motion = now;
        self.accumulated_pause = Duration::ZERO;
        self.total_distance_m = 0.0;
        self.last_position = None;
        self.active_log = Some(log);
    }

    /// Translates this tick's classifier verdict into a state machine event.
    ///
    /// Returns `None` while idle, and while still but within the timeout.
    pub fn motion_event(&mut self, moving: bool, now: Duration, auto_pause_timeout: Duration) -> Option<SessionEvent> {
        if !self.phase.is_active() {
            return None;
        }

        if moving {
            self.last_motion = now;
            Some(SessionEvent::Motion)
        } else if now.saturating_sub(self.last_motion) >= auto_pause_timeout {
            Some(SessionEvent::Inactive)
        } else {
            None
        }
    }

    /// Commits a transition computed by [`Phase::next`].
    ///
    /// `Effect::OpenLog` must be committed through [`SessionContext::begin`]
    /// instead, once the log exists. Returns the log handle released by a
    /// transition to Idle.
    pub fn commit(&mut self, phase: Phase, effect: Effect, now: Duration) -> Option<LogHandle> {
        if let Effect::Resume { paused_for } = effect {
            self.accumulated_pause += paused_for;
            self.last_motion = now;
        }

        self.phase = phase;

        if phase.is_active() {
            None
        } else {
            self.active_log.take()
        }
    }

    /// Active (unpaused) session time.
    ///
    /// Zero while idle; frozen at the pause instant while paused.
    pub fn elapsed(&self, now: Duration) -> Duration {
        let end = match self.phase {
            Phase::Idle => return Duration::ZERO,
            Phase::Recording => now,
            Phase::Paused { since, .. } => since,
        };
        end.saturating_sub(self.session_start)
            .saturating_sub(self.accumulated_pause)
    }

    /// Decides whether `fix` goes into the log.
    ///
    /// # Returns
    ///
    /// `Some(step)` with the distance to add if admitted, `None` otherwise
    pub fn admit(&self, fix: &Fix, policy: &AdmissionPolicy) -> Option<f64> {
        if !fix.valid {
            return None;
        }

        let Some((lat, lon)) = self.last_position else {
            // First point of the session is always kept
            return Some(0.0);
        };

        let d = haversine_m(lat, lon, fix.lat, fix.lon);
        let stationary_ok = policy.admit_stationary && policy.min_distance_m == 0.0;
        if d > policy.min_distance_m || stationary_ok {
            Some(d)
        } else {
            None
        }
    }

    /// Records an admitted point and accumulates its distance step.
    pub fn record_point(&mut self, fix: &Fix, step_m: f64) {
        if self.last_position.is_some() && step_m.is_finite() {
            self.total_distance_m += step_m.max(0.0);
        }
        self.last_position = Some((fix.lat, fix.lon));
    }
}

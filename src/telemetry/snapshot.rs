//! # Telemetry Snapshot
//!
//! The status value handed to query callers.
//!
//! A snapshot is always built in one piece from a single tick's [`Reading`]
//! and the session context at that tick, then swapped in whole. Consumers
//! copy it out; nothing ever writes individual fields of the published value.

use serde::Serialize;
use std::time::Duration;

use crate::sensors::{Fix, Vec3};
use crate::session::{SessionContext, SessionState};

/// Everything measured and derived during one sampler tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub fix: Fix,
    /// `None` when the inertial source is absent or did not answer.
    pub accel: Option<Vec3>,
    /// Speed after smoothing (km/h).
    pub smoothed_speed_kmph: f64,
    /// Last valid altitude (m).
    pub held_altitude_m: f64,
    pub battery_v: f64,
}

/// Consistent copy of current telemetry and session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Sampler tick that produced this snapshot (0 = never published).
    pub tick: u64,
    /// Monotonic publish time in milliseconds.
    pub published_at_ms: u64,
    pub state: SessionState,
    pub fix_valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub speed_kmph: f64,
    pub altitude_m: f64,
    pub satellites: u32,
    pub hdop: f64,
    pub distance_m: f64,
    pub accel: Vec3,
    pub battery_v: f64,
    pub elapsed_s: u64,
}

impl TelemetrySnapshot {
    /// Builds the snapshot for one tick.
    pub fn capture(reading: &Reading, session: &SessionContext, tick: u64, now: Duration) -> Self {
        let fix = &reading.fix;
        let (lat, lon) = if fix.valid { (fix.lat, fix.lon) } else { (0.0, 0.0) };

        Self {
            tick,
            published_at_ms: now.as_millis() as u64,
            state: session.state(),
            fix_valid: fix.valid,
            lat,
            lon,
            speed_kmph: reading.smoothed_speed_kmph,
            altitude_m: reading.held_altitude_m,
            satellites: fix.satellites,
            hdop: fix.hdop,
            distance_m: session.total_distance_m(),
            accel: reading.accel.unwrap_or_default(),
            battery_v: reading.battery_v,
            elapsed_s: session.elapsed(now).as_secs(),
        }
    }

    /// Age of this snapshot relative to `now`.
    pub fn staleness(&self, now: Duration) -> Duration {
        now.saturating_sub(Duration::from_millis(self.published_at_ms))
    }
}

//! # Sensors Module
//!
//! Collaborator interfaces for the position, inertial and power sources.
//!
//! Acquisition and protocol decoding live behind these traits; the tracker
//! only ever sees decoded readings. Every source is infallible from the
//! caller's point of view: a missing fix is `Fix::valid == false`, an absent
//! IMU is `None`, a failed battery read is `None` (published as 0.0).

pub mod replay;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Tri-axis acceleration in gravity-normalized units (1.0 = 1 g)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A single reading from the position source
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// True if the receiver reports a usable position.
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub speed_kmph: f64,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub satellites: u32,
    /// Horizontal dilution of precision.
    #[serde(default)]
    pub hdop: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Fix {
    /// A reading with no usable position.
    pub fn none() -> Self {
        Self::default()
    }

    /// Speed to feed the classifier and smoothing filter (0 without a fix).
    pub fn effective_speed(&self) -> f64 {
        if self.valid {
            self.speed_kmph
        } else {
            0.0
        }
    }
}

/// Position/motion source (GNSS receiver)
#[cfg_attr(test, mockall::automock)]
pub trait PositionSource: Send {
    /// Latest decoded fix; `valid == false` while the receiver has no fix.
    fn read_fix(&mut self) -> Fix;
}

/// Inertial source (accelerometer)
#[cfg_attr(test, mockall::automock)]
pub trait InertialSource: Send {
    /// Latest acceleration, or `None` if the sensor did not answer.
    fn read_accel(&mut self) -> Option<Vec3>;
}

/// Power source (battery voltage monitor)
#[cfg_attr(test, mockall::automock)]
pub trait PowerSource: Send {
    /// Battery voltage in volts, or `None` on a failed read.
    fn read_voltage(&mut self) -> Option<f64>;
}

/// Position source used when no receiver is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFix;

impl PositionSource for NoFix {
    fn read_fix(&mut self) -> Fix {
        Fix::none()
    }
}

/// Power source used when no voltage monitor is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBattery;

impl PowerSource for NoBattery {
    fn read_voltage(&mut self) -> Option<f64> {
        None
    }
}

/// Rate-limited battery reader
///
/// Voltage changes slowly and the monitor may be slow to answer, so the
/// sampler reads it at most once per interval and republishes the cached
/// value in between.
#[derive(Debug, Clone)]
pub struct BatteryCache {
    interval: Duration,
    last_read: Option<Duration>,
    voltage: f64,
}

impl BatteryCache {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_read: None,
            voltage: 0.0,
        }
    }

    /// Returns the cached voltage, refreshing it from `source` when the
    /// interval has elapsed. A failed read publishes 0.0.
    pub fn read(&mut self, now: Duration, source: &mut dyn PowerSource) -> f64 {
        let due = match self.last_read {
            None => true,
            Some(at) => now.saturating_sub(at) >= self.interval,
        };

        if due {
            self.voltage = match source.read_voltage() {
                Some(v) => v,
                None => {
                    debug!("Battery read failed, publishing 0.0");
                    0.0
                }
            };
            self.last_read = Some(now);
        }

        self.voltage
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }
}

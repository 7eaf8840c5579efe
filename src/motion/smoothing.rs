//! # Smoothing Module
//!
//! Display-side conditioning of GPS readings.
//!
//! Neither filter touches what is written to the log; they only shape the
//! values published in status snapshots.

use crate::sensors::Fix;

/// Number of speed samples averaged by [`SpeedFilter`].
pub const SPEED_FILTER_LEN: usize = 5;

/// Moving average over the last `N` raw speed samples.
///
/// Fixed-capacity ring with a write cursor. The ring starts zero-filled, so
/// the first `N - 1` outputs ramp up from zero.
#[derive(Debug, Clone)]
pub struct SpeedFilter<const N: usize = SPEED_FILTER_LEN> {
    samples: [f64; N],
    cursor: usize,
}

impl<const N: usize> Default for SpeedFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SpeedFilter<N> {
    /// Evaluated at compile time; a zero-length window does not build.
    const NON_EMPTY: () = assert!(N > 0, "SpeedFilter window must be non-empty");

    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            samples: [0.0; N],
            cursor: 0,
        }
    }

    /// Pushes a raw sample, overwriting the oldest, and returns the new mean.
    pub fn push(&mut self, speed_kmph: f64) -> f64 {
        self.samples[self.cursor] = speed_kmph;
        self.cursor = (self.cursor + 1) % N;
        self.mean()
    }

    /// Arithmetic mean of the window.
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / N as f64
    }

    pub fn reset(&mut self) {
        self.samples = [0.0; N];
        self.cursor = 0;
    }
}

/// Last known-valid altitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct AltitudeHold {
    altitude_m: f64,
}

impl AltitudeHold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the fix altitude if the fix is valid, otherwise keeps the held value.
    pub fn update(&mut self, fix: &Fix) -> f64 {
        if fix.valid && fix.altitude_m.is_finite() {
            self.altitude_m = fix.altitude_m;
        }
        self.altitude_m
    }

    pub fn altitude(&self) -> f64 {
        self.altitude_m
    }
}

//! # Clock Module
//!
//! Time abstraction shared by the sampler and the command surface.
//!
//! Session arithmetic runs on a monotonic offset since process start
//! (`Duration`), so it can be driven explicitly in tests. Wall-clock time is
//! only used for naming log files.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Current UTC wall-clock time.
    fn wall(&self) -> DateTime<Utc>;
}

/// Real-time clock backed by `tokio::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

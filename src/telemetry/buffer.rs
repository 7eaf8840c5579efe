//! # Log Buffer
//!
//! In-memory accumulation of formatted records between flushes.
//!
//! ## Flush Policy
//!
//! A flush is due when either:
//! - the buffer holds at least `size_threshold` bytes, or
//! - the buffer is non-empty and `interval` has passed since the last flush.
//!
//! Session boundaries (pause, stop) flush unconditionally; that is decided by
//! the tracker, not here. The buffer only clears when told a flush succeeded,
//! so a failed write loses nothing.

use bytes::BytesMut;
use std::time::Duration;

use crate::config::LogConfig;

/// Flush thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub size_threshold: usize,
    pub interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            size_threshold: 512,
            interval: Duration::from_secs(10),
        }
    }
}

impl From<&LogConfig> for FlushPolicy {
    fn from(config: &LogConfig) -> Self {
        Self {
            size_threshold: config.flush_size_bytes,
            interval: config.flush_interval(),
        }
    }
}

/// Pending log bytes plus the flush timer
#[derive(Debug)]
pub struct LogBuffer {
    data: BytesMut,
    last_flush: Duration,
    policy: FlushPolicy,
}

impl LogBuffer {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            // One record of slack above the threshold before a flush lands
            data: BytesMut::with_capacity(policy.size_threshold + 160),
            last_flush: Duration::ZERO,
            policy,
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes awaiting write.
    pub fn pending(&self) -> &[u8] {
        &self.data
    }

    pub fn append(&mut self, record: &str) {
        self.data.extend_from_slice(record.as_bytes());
    }

    /// True if the size or time threshold has been reached.
    pub fn should_flush(&self, now: Duration) -> bool {
        if self.data.is_empty() {
            return false;
        }
        self.data.len() >= self.policy.size_threshold
            || now.saturating_sub(self.last_flush) >= self.policy.interval
    }

    /// Clears the buffer after a successful write and restarts the timer.
    pub fn mark_flushed(&mut self, now: Duration) {
        self.data.clear();
        self.last_flush = now;
    }

    /// Drops pending data without writing it and restarts the timer.
    pub fn discard(&mut self, now: Duration) {
        self.data.clear();
        self.last_flush = now;
    }

    pub fn last_flush(&self) -> Duration {
        self.last_flush
    }
}

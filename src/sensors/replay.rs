//! # Replay Feed
//!
//! Drives the sampler from a recorded JSON-lines file instead of live sensors.
//!
//! Each non-empty line is one frame:
//!
//! ```text
//! {"fix":{"valid":true,"lat":52.0,"lon":19.0,"speed_kmph":4.2,"altitude_m":110.0,"satellites":9,"hdop":0.9},"accel":{"x":0.0,"y":0.02,"z":1.01},"battery_v":3.92}
//! ```
//!
//! The position source advances one frame per read; the inertial and power
//! sources report values from the frame most recently read. Once the file is
//! exhausted the last frame is held.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Fix, InertialSource, PositionSource, PowerSource, Vec3};
use crate::error::{Result, TrackerError};

/// One recorded sensor frame
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub fix: Fix,
    #[serde(default)]
    pub accel: Option<Vec3>,
    #[serde(default)]
    pub battery_v: Option<f64>,
}

#[derive(Debug)]
struct Cursor {
    frames: Vec<Frame>,
    next: usize,
    current: Frame,
}

/// Parsed replay file
#[derive(Debug)]
pub struct ReplayFeed {
    frames: Vec<Frame>,
}

impl ReplayFeed {
    /// Load a replay file from disk
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Replay` on a malformed line
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse replay frames from JSON-lines text
    pub fn parse(contents: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: Frame = serde_json::from_str(line)
                .map_err(|e| TrackerError::Replay(format!("line {}: {}", idx + 1, e)))?;
            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(TrackerError::Replay("no frames".to_string()));
        }

        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into the three source handles sharing one cursor.
    pub fn into_sources(self) -> (ReplayPosition, ReplayInertial, ReplayPower) {
        let cursor = Arc::new(Mutex::new(Cursor {
            frames: self.frames,
            next: 0,
            current: Frame::default(),
        }));
        (
            ReplayPosition { cursor: Arc::clone(&cursor) },
            ReplayInertial { cursor: Arc::clone(&cursor) },
            ReplayPower { cursor },
        )
    }
}

fn with_cursor<T>(cursor: &Mutex<Cursor>, f: impl FnOnce(&mut Cursor) -> T) -> T {
    // A panic while holding the cursor cannot leave it inconsistent
    let mut guard = cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

/// Position half of a replay feed
pub struct ReplayPosition {
    cursor: Arc<Mutex<Cursor>>,
}

impl PositionSource for ReplayPosition {
    fn read_fix(&mut self) -> Fix {
        with_cursor(&self.cursor, |c| {
            if let Some(frame) = c.frames.get(c.next) {
                c.current = *frame;
                c.next += 1;
            }
            c.current.fix
        })
    }
}

/// Inertial half of a replay feed
pub struct ReplayInertial {
    cursor: Arc<Mutex<Cursor>>,
}

impl InertialSource for ReplayInertial {
    fn read_accel(&mut self) -> Option<Vec3> {
        with_cursor(&self.cursor, |c| c.current.accel)
    }
}

/// Power half of a replay feed
pub struct ReplayPower {
    cursor: Arc<Mutex<Cursor>>,
}

impl PowerSource for ReplayPower {
    fn read_voltage(&mut self) -> Option<f64> {
        with_cursor(&self.cursor, |c| c.current.battery_v)
    }
}

//! Bounded history of the current session's admitted points, so a client
//! that reconnects mid-session can redraw the track.

use serde::Serialize;
use std::collections::VecDeque;

/// One admitted point as shown on a map/chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub alt: f64,
    pub hdop: f64,
    pub elapsed_s: u64,
}

/// Ring of the most recent track points
#[derive(Debug, Clone)]
pub struct TrackHistory {
    points: VecDeque<TrackPoint>,
    capacity: usize,
}

impl TrackHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: TrackPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Oldest-first copy of the history.
    pub fn to_vec(&self) -> Vec<TrackPoint> {
        self.points.iter().copied().collect()
    }
}

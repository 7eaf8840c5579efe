//! # Motion Module
//!
//! Decides whether the carried object is moving and smooths the values
//! published to status consumers.
//!
//! This module handles:
//! - Fusing GPS speed with accelerometer vibration into a moving/still verdict
//! - Averaging instantaneous GPS speed over a fixed window
//! - Holding the last valid altitude across brief signal loss

pub mod classifier;
pub mod smoothing;

pub use classifier::MotionClassifier;
pub use smoothing::{AltitudeHold, SpeedFilter, SPEED_FILTER_LEN};

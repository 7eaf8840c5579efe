//! # Motion Classifier
//!
//! Fuses GPS speed with accelerometer vibration into a single "moving" verdict.
//!
//! ## Rule
//!
//! - Without an accelerometer: `speed > speed_threshold`
//! - With an accelerometer: `speed > speed_threshold || |‖a‖ - 1.0| > vibration_threshold`
//!
//! At rest the accelerometer reads 1 g regardless of orientation, so any
//! deviation of the vector length from 1.0 is treated as vibration from
//! carrying or riding.
//!
//! ## Usage
//!
//! ```
//! use trail_logger::motion::MotionClassifier;
//! use trail_logger::sensors::Vec3;
//!
//! let classifier = MotionClassifier::new(2.0, 0.15);
//!
//! // Still on a table
//! assert!(!classifier.is_moving(0.3, Some(Vec3::new(0.0, 0.0, 1.0))));
//!
//! // Walking pace
//! assert!(classifier.is_moving(4.5, None));
//! ```

use crate::config::MotionConfig;
use crate::sensors::Vec3;

/// Stateless motion classifier.
#[derive(Debug, Clone, Copy)]
pub struct MotionClassifier {
    /// GPS speed above which the device is moving (km/h).
    speed_threshold_kmph: f64,
    /// Allowed deviation of acceleration magnitude from 1 g.
    vibration_threshold_g: f64,
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self {
            speed_threshold_kmph: 2.0,
            vibration_threshold_g: 0.15,
        }
    }
}

impl From<&MotionConfig> for MotionClassifier {
    fn from(config: &MotionConfig) -> Self {
        Self::new(config.speed_threshold_kmph, config.vibration_threshold_g)
    }
}

impl MotionClassifier {
    #[must_use]
    pub fn new(speed_threshold_kmph: f64, vibration_threshold_g: f64) -> Self {
        Self {
            speed_threshold_kmph,
            vibration_threshold_g,
        }
    }

    #[must_use]
    pub fn speed_threshold(&self) -> f64 {
        self.speed_threshold_kmph
    }

    #[must_use]
    pub fn vibration_threshold(&self) -> f64 {
        self.vibration_threshold_g
    }

    /// Classifies one sensor reading.
    ///
    /// # Arguments
    ///
    /// * `gps_speed_kmph` - Instantaneous GPS speed (0.0 without a fix)
    /// * `accel` - Acceleration in g, or `None` if the IMU is absent
    ///
    /// # Returns
    ///
    /// `true` if either sensor indicates motion
    #[must_use]
    pub fn is_moving(&self, gps_speed_kmph: f64, accel: Option<Vec3>) -> bool {
        let gps_moving = gps_speed_kmph > self.speed_threshold_kmph;

        match accel {
            None => gps_moving,
            Some(a) => {
                let deviation = (a.magnitude() - 1.0).abs();
                gps_moving || deviation > self.vibration_threshold_g
            }
        }
    }
}

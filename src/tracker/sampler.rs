//! # Sampler
//!
//! The periodic task that reads sensors, drives automatic transitions,
//! appends admitted points and publishes the telemetry snapshot.
//!
//! Each tick runs in this order:
//! 1. Read position, acceleration (if an IMU is present) and cached battery
//! 2. Smooth speed, hold altitude, classify motion
//! 3. Under the sampler lock tier: auto-pause/resume, admit and buffer the
//!    point, flush if a threshold was reached
//! 4. Publish the snapshot with `try_lock`
//!
//! If step 3 cannot get the lock in time the logic is skipped for this tick;
//! sensor reads and smoothing have still happened.

use tracing::debug;

use super::Tracker;
use crate::clock::Clock;
use crate::config::Config;
use crate::motion::{AltitudeHold, MotionClassifier, SpeedFilter};
use crate::sensors::{BatteryCache, InertialSource, PositionSource, PowerSource};
use crate::session::SessionState;
use crate::telemetry::Reading;

/// Result of one tick, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub moving: bool,
    /// False if the logic step was skipped on lock contention.
    pub logic_ran: bool,
    pub admitted: bool,
    pub flushed: bool,
    pub transition: Option<SessionState>,
    pub published: bool,
}

/// Owns the sensor sources and per-tick derived state
pub struct Sampler {
    tracker: Tracker,
    position: Box<dyn PositionSource>,
    inertial: Option<Box<dyn InertialSource>>,
    power: Box<dyn PowerSource>,
    classifier: MotionClassifier,
    speed: SpeedFilter,
    altitude: AltitudeHold,
    battery: BatteryCache,
    ticks: u64,
}

impl Sampler {
    /// Creates a sampler feeding `tracker`.
    ///
    /// # Arguments
    ///
    /// * `tracker` - Shared tracker core
    /// * `position` - Position receiver
    /// * `inertial` - Accelerometer, `None` if not fitted
    /// * `power` - Battery voltage source
    /// * `config` - Motion thresholds and battery read interval
    pub fn new(
        tracker: Tracker,
        position: Box<dyn PositionSource>,
        inertial: Option<Box<dyn InertialSource>>,
        power: Box<dyn PowerSource>,
        config: &Config,
    ) -> Self {
        Self {
            tracker,
            position,
            inertial,
            power,
            classifier: MotionClassifier::from(&config.motion),
            speed: SpeedFilter::new(),
            altitude: AltitudeHold::new(),
            battery: BatteryCache::new(config.power.battery_read_interval()),
            ticks: 0,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one sampling cycle.
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let now = self.tracker.clock().now();

        let fix = self.position.read_fix();
        let accel = self.inertial.as_mut().and_then(|imu| imu.read_accel());
        let speed = fix.effective_speed();

        let reading = Reading {
            fix,
            accel,
            smoothed_speed_kmph: self.speed.push(speed),
            held_altitude_m: self.altitude.update(&fix),
            battery_v: self.battery.read(now, self.power.as_mut()),
        };
        let moving = self.classifier.is_moving(speed, accel);

        let mut report = TickReport {
            tick: self.ticks,
            moving,
            ..TickReport::default()
        };

        match self.tracker.step(&reading, moving).await {
            Ok(outcome) => {
                report.logic_ran = true;
                report.admitted = outcome.admitted;
                report.flushed = outcome.flushed;
                report.transition = outcome.transition;
            }
            Err(e) => debug!("Tick {}: logic skipped ({})", self.ticks, e),
        }

        report.published = self.tracker.publish(&reading, self.ticks);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mocks::ManualClock;
    use crate::sensors::{Fix, MockInertialSource, MockPositionSource, MockPowerSource, Vec3};
    use crate::storage::mocks::MemoryStorage;
    use crate::tracker::TrackerSettings;
    use std::sync::Arc;

    fn moving_fix() -> Fix {
        Fix {
            valid: true,
            lat: 52.0,
            lon: 19.0,
            speed_kmph: 12.0,
            altitude_m: 80.0,
            satellites: 10,
            hdop: 0.8,
            timestamp: None,
        }
    }

    fn tracker(clock: &ManualClock) -> (Tracker, MemoryStorage) {
        let storage = MemoryStorage::new();
        let tracker = Tracker::new(
            TrackerSettings::default(),
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
        );
        (tracker, storage)
    }

    fn power(volts: f64) -> Box<MockPowerSource> {
        let mut power = MockPowerSource::new();
        power.expect_read_voltage().returning(move || Some(volts));
        Box::new(power)
    }

    #[tokio::test]
    async fn test_tick_publishes_snapshot() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        position.expect_read_fix().returning(moving_fix);
        let mut imu = MockInertialSource::new();
        imu.expect_read_accel().returning(|| Some(Vec3::new(0.0, 0.0, 1.0)));

        let mut sampler = Sampler::new(
            tracker.clone(),
            Box::new(position),
            Some(Box::new(imu)),
            power(3.9),
            &Config::default(),
        );

        clock.advance_ms(100);
        let report = sampler.tick().await;
        assert_eq!(report.tick, 1);
        assert!(report.moving);
        assert!(report.logic_ran);
        assert!(report.published);
        assert!(!report.admitted, "Nothing is logged while idle");

        let status = tracker.status().await.unwrap();
        assert_eq!(status.tick, 1);
        assert_eq!(status.published_at_ms, 100);
        assert_eq!((status.lat, status.lon), (52.0, 19.0));
        assert_eq!(status.altitude_m, 80.0);
        assert_eq!(status.battery_v, 3.9);
        // One of five filter slots holds 12 km/h
        assert!((status.speed_kmph - 2.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tick_logs_while_recording() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        position.expect_read_fix().returning(moving_fix);

        let mut sampler = Sampler::new(tracker.clone(), Box::new(position), None, power(3.7), &Config::default());
        tracker.start().await.unwrap();

        let report = sampler.tick().await;
        assert!(report.admitted);
        assert_eq!(tracker.recent_track().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_imu_degrades_to_speed_only() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        position.expect_read_fix().returning(|| Fix {
            speed_kmph: 1.0,
            ..moving_fix()
        });

        let mut sampler = Sampler::new(tracker, Box::new(position), None, power(3.7), &Config::default());
        let report = sampler.tick().await;
        assert!(!report.moving, "Slow without IMU reads as stationary");
    }

    #[tokio::test]
    async fn test_imu_failure_degrades_to_speed_only() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        position.expect_read_fix().returning(moving_fix);
        let mut imu = MockInertialSource::new();
        imu.expect_read_accel().returning(|| None);

        let mut sampler = Sampler::new(tracker.clone(), Box::new(position), Some(Box::new(imu)), power(3.7), &Config::default());
        let report = sampler.tick().await;
        assert!(report.moving);
        assert_eq!(tracker.status().await.unwrap().accel, Vec3::default());
    }

    #[tokio::test]
    async fn test_lost_fix_does_not_move_position() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        let mut calls = 0;
        position.expect_read_fix().returning(move || {
            calls += 1;
            if calls == 1 {
                moving_fix()
            } else {
                Fix::none()
            }
        });

        let mut sampler = Sampler::new(tracker.clone(), Box::new(position), None, power(3.7), &Config::default());
        tracker.start().await.unwrap();

        assert!(sampler.tick().await.admitted);
        clock.advance_ms(100);
        let report = sampler.tick().await;
        assert!(!report.admitted);

        let status = tracker.status().await.unwrap();
        assert!(!status.fix_valid);
        assert_eq!(status.altitude_m, 80.0, "Altitude holds its last valid value");
        assert_eq!(status.distance_m, 0.0);
    }

    #[tokio::test]
    async fn test_battery_read_is_rate_limited() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        position.expect_read_fix().returning(Fix::none);
        let mut power = MockPowerSource::new();
        power.expect_read_voltage().times(2).returning(|| Some(3.8));

        let mut sampler = Sampler::new(tracker, Box::new(position), None, Box::new(power), &Config::default());
        // Ticks at 0.0 s through 5.0 s with the default 5 s interval
        for _ in 0..=50 {
            sampler.tick().await;
            clock.advance_ms(100);
        }
        assert_eq!(sampler.ticks(), 51);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_during_sampling_is_consistent() {
        let clock = ManualClock::new();
        let (tracker, _) = tracker(&clock);

        let mut position = MockPositionSource::new();
        let mut step = 0u64;
        position.expect_read_fix().returning(move || {
            step += 1;
            Fix {
                lat: 52.0 + step as f64 * 0.001,
                ..moving_fix()
            }
        });

        let mut sampler = Sampler::new(tracker.clone(), Box::new(position), None, power(3.7), &Config::default());
        tracker.start().await.unwrap();

        let reader = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let mut last_tick = 0;
                let mut last_distance = 0.0;
                for _ in 0..200 {
                    if let Ok(snap) = tracker.status().await {
                        assert!(snap.tick >= last_tick);
                        assert!(snap.distance_m >= last_distance);
                        // Position and distance come from the same tick
                        if snap.tick > 0 {
                            let expected_lat = 52.0 + snap.tick as f64 * 0.001;
                            assert!((snap.lat - expected_lat).abs() < 1e-9);
                        }
                        last_tick = snap.tick;
                        last_distance = snap.distance_m;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..100 {
            clock.advance_ms(100);
            sampler.tick().await;
            tokio::task::yield_now().await;
        }
        reader.await.unwrap();
    }
}

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub locking: LockingConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Sampler loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// JSON-lines replay file; empty means no position input.
    #[serde(default)]
    pub replay_path: String,
}

/// Motion classifier thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct MotionConfig {
    #[serde(default = "default_speed_threshold_kmph")]
    pub speed_threshold_kmph: f64,

    #[serde(default = "default_vibration_threshold_g")]
    pub vibration_threshold_g: f64,
}

/// Session policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_auto_pause_timeout_ms")]
    pub auto_pause_timeout_ms: u64,

    #[serde(default = "default_track_history_len")]
    pub track_history_len: usize,
}

/// Log buffer and file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,

    #[serde(default)]
    pub admit_stationary: bool,

    #[serde(default = "default_flush_size_bytes")]
    pub flush_size_bytes: usize,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_max_listed_files")]
    pub max_listed_files: usize,
}

/// Lock acquisition budgets
#[derive(Debug, Deserialize, Clone)]
pub struct LockingConfig {
    #[serde(default = "default_sampler_timeout_ms")]
    pub sampler_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_critical_timeout_ms")]
    pub critical_timeout_ms: u64,

    #[serde(default = "default_storage_write_timeout_ms")]
    pub storage_write_timeout_ms: u64,
}

/// Power source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PowerConfig {
    #[serde(default = "default_battery_read_interval_ms")]
    pub battery_read_interval_ms: u64,
}

/// Diagnostic (tracing) output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rolling diagnostic files; empty means stderr only.
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_tick_interval_ms() -> u64 { 100 }

fn default_speed_threshold_kmph() -> f64 { 2.0 }
fn default_vibration_threshold_g() -> f64 { 0.15 }

fn default_auto_pause_timeout_ms() -> u64 { 5000 }
fn default_track_history_len() -> usize { 500 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_file_prefix() -> String { "log_".to_string() }
fn default_min_distance_m() -> f64 { 5.0 }
fn default_flush_size_bytes() -> usize { 512 }
fn default_flush_interval_ms() -> u64 { 10_000 }
fn default_max_listed_files() -> usize { 50 }

fn default_sampler_timeout_ms() -> u64 { 10 }
fn default_command_timeout_ms() -> u64 { 100 }
fn default_critical_timeout_ms() -> u64 { 500 }
fn default_storage_write_timeout_ms() -> u64 { 80 }

fn default_battery_read_interval_ms() -> u64 { 5000 }

fn default_level() -> String { "info".to_string() }

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            replay_path: String::new(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_threshold_kmph: default_speed_threshold_kmph(),
            vibration_threshold_g: default_vibration_threshold_g(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_pause_timeout_ms: default_auto_pause_timeout_ms(),
            track_history_len: default_track_history_len(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            min_distance_m: default_min_distance_m(),
            admit_stationary: false,
            flush_size_bytes: default_flush_size_bytes(),
            flush_interval_ms: default_flush_interval_ms(),
            max_listed_files: default_max_listed_files(),
        }
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            sampler_timeout_ms: default_sampler_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            critical_timeout_ms: default_critical_timeout_ms(),
            storage_write_timeout_ms: default_storage_write_timeout_ms(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            battery_read_interval_ms: default_battery_read_interval_ms(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: String::new(),
        }
    }
}

impl SamplerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl SessionConfig {
    pub fn auto_pause_timeout(&self) -> Duration {
        Duration::from_millis(self.auto_pause_timeout_ms)
    }
}

impl LogConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl LockingConfig {
    pub fn sampler_timeout(&self) -> Duration {
        Duration::from_millis(self.sampler_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn critical_timeout(&self) -> Duration {
        Duration::from_millis(self.critical_timeout_ms)
    }

    pub fn storage_write_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_write_timeout_ms)
    }
}

impl PowerConfig {
    pub fn battery_read_interval(&self) -> Duration {
        Duration::from_millis(self.battery_read_interval_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use trail_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.sampler.tick_interval_ms == 0 || self.sampler.tick_interval_ms > 10_000 {
            return Err(invalid("tick_interval_ms must be between 1 and 10000"));
        }

        // Validate motion thresholds
        if !(self.motion.speed_threshold_kmph > 0.0 && self.motion.speed_threshold_kmph <= 20.0) {
            return Err(invalid("speed_threshold_kmph must be in (0.0, 20.0]"));
        }

        if !(self.motion.vibration_threshold_g > 0.0 && self.motion.vibration_threshold_g <= 2.0) {
            return Err(invalid("vibration_threshold_g must be in (0.0, 2.0]"));
        }

        if self.session.auto_pause_timeout_ms == 0 {
            return Err(invalid("auto_pause_timeout_ms must be greater than 0"));
        }

        if self.session.track_history_len == 0 {
            return Err(invalid("track_history_len must be greater than 0"));
        }

        // Validate log files
        if self.log.dir.is_empty() {
            return Err(invalid("log dir cannot be empty"));
        }

        if self.log.file_prefix.is_empty()
            || self.log.file_prefix.contains(['/', '\\'])
            || self.log.file_prefix.contains("..")
        {
            return Err(invalid("file_prefix must be non-empty and contain no path separators"));
        }

        if !(self.log.min_distance_m >= 0.0) {
            return Err(invalid("min_distance_m must be >= 0.0"));
        }

        if self.log.flush_size_bytes == 0 {
            return Err(invalid("flush_size_bytes must be greater than 0"));
        }

        if self.log.flush_interval_ms == 0 {
            return Err(invalid("flush_interval_ms must be greater than 0"));
        }

        if self.log.max_listed_files == 0 {
            return Err(invalid("max_listed_files must be greater than 0"));
        }

        // Validate lock tiers
        let lock = &self.locking;
        if lock.sampler_timeout_ms == 0 || lock.sampler_timeout_ms > 1000 {
            return Err(invalid("sampler_timeout_ms must be between 1 and 1000"));
        }

        if lock.command_timeout_ms < lock.sampler_timeout_ms || lock.command_timeout_ms > 10_000 {
            return Err(invalid("command_timeout_ms must be between sampler_timeout_ms and 10000"));
        }

        if lock.critical_timeout_ms < lock.command_timeout_ms || lock.critical_timeout_ms > 10_000 {
            return Err(invalid("critical_timeout_ms must be between command_timeout_ms and 10000"));
        }

        if lock.storage_write_timeout_ms == 0 || lock.storage_write_timeout_ms > 10_000 {
            return Err(invalid("storage_write_timeout_ms must be between 1 and 10000"));
        }

        // A command must be able to wait out one in-flight flush
        if lock.command_timeout_ms <= lock.storage_write_timeout_ms {
            return Err(invalid("command_timeout_ms must exceed storage_write_timeout_ms"));
        }

        if self.power.battery_read_interval_ms == 0 {
            return Err(invalid("battery_read_interval_ms must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.diagnostics.level.as_str()) {
            return Err(invalid("level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

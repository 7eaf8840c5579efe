//! # Error Types
//!
//! Custom error types for Trail Logger using `thiserror`.

use thiserror::Error;

/// Main error type for Trail Logger
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shared state lock could not be acquired within its budget
    #[error("Busy: {0}")]
    Busy(&'static str),

    /// Log name failed validation
    #[error("Invalid log name: {0}")]
    InvalidLogName(String),

    /// Requested log does not exist
    #[error("Log not found: {0}")]
    LogNotFound(String),

    /// Operation not allowed on the log of the running session
    #[error("Log is in use by the active session: {0}")]
    ActiveLog(String),

    /// Replay feed could not be parsed
    #[error("Replay error: {0}")]
    Replay(String),
}

impl TrackerError {
    /// Returns true for the transient lock-busy outcome.
    pub fn is_busy(&self) -> bool {
        matches!(self, TrackerError::Busy(_))
    }
}

/// Result type alias for Trail Logger
pub type Result<T> = std::result::Result<T, TrackerError>;

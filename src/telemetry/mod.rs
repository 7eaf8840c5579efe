//! # Telemetry Module
//!
//! Status snapshots and CSV session logs.
//!
//! This module handles:
//! - Building the status snapshot published after each tick
//! - Formatting admitted points as fixed-field CSV records
//! - Buffering records in memory and deciding when to flush
//! - Keeping a bounded history of the current session's track

pub mod buffer;
pub mod record;
pub mod snapshot;
pub mod track;

pub use buffer::{FlushPolicy, LogBuffer};
pub use snapshot::{Reading, TelemetrySnapshot};
pub use track::{TrackHistory, TrackPoint};

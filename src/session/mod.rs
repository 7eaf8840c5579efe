//! # Session Module
//!
//! Recording session state machine and bookkeeping.
//!
//! This module handles:
//! - Idle / Recording / Paused transitions, manual and automatic
//! - Distance accumulation between admitted points
//! - Active-time accounting that excludes pauses

pub mod context;
pub mod geo;
pub mod state;

pub use context::SessionContext;
pub use state::{Effect, Phase, SessionEvent, SessionState};

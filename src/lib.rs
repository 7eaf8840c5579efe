//! # Trail Logger Library
//!
//! Record GPS tracks from a portable receiver, with automatic pause when the
//! carrier stops moving.
//!
//! This library provides the session core of the logger: a periodic sampler
//! that fuses position, acceleration and battery readings, a recording state
//! machine (Idle / Recording / Paused), buffered CSV logging to removable
//! storage, and a command surface that request handlers call concurrently
//! with the sampler.

pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod motion;
pub mod sensors;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod tracker;

//! # Session State Machine
//!
//! Pure transition function for the recording session.
//!
//! ## Transitions
//!
//! | From | Event | To | Effect |
//! |------|-------|----|--------|
//! | Idle | Start | Recording | OpenLog |
//! | Recording | Inactive | Paused (auto) | Flush |
//! | Recording | Pause | Paused (manual) | Flush |
//! | Paused (auto) | Motion | Recording | Resume |
//! | Paused (manual) | Motion | Paused (manual) | None |
//! | Paused (any) | Start | Recording | Resume |
//! | Recording / Paused | Stop | Idle | CloseLog |
//! | Recording / Paused | Discard | Idle | DeleteLog |
//!
//! Every other pair is a no-op: same phase, `Effect::None`.
//!
//! The function performs no I/O. The tracker applies the returned effect and
//! may refuse to commit the new phase if the effect fails (for example
//! `OpenLog` when storage is unavailable).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "IDLE",
            SessionState::Recording => "REC",
            SessionState::Paused => "PAUSE",
        };
        f.write_str(name)
    }
}

/// Internal session phase, carrying what each state needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Recording,
    Paused {
        /// Entered by explicit command; blocks automatic resume.
        manual: bool,
        /// Monotonic time the pause began.
        since: Duration,
    },
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `start` / `resume` command.
    Start,
    /// `pause` command.
    Pause,
    /// `stop` command.
    Stop,
    /// `discard` command.
    Discard,
    /// Classifier reported motion this tick.
    Motion,
    /// Classifier has reported no motion for at least the auto-pause timeout.
    Inactive,
}

/// Side effect the caller must perform for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Create a new log destination and reset bookkeeping.
    OpenLog,
    /// Flush the log buffer (entering a pause).
    Flush,
    /// Add the finished pause to the accumulated pause time.
    Resume { paused_for: Duration },
    /// Final flush; keep the log.
    CloseLog,
    /// Drop the buffer; delete the log.
    DeleteLog,
}

impl Phase {
    pub fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Recording => SessionState::Recording,
            Phase::Paused { .. } => SessionState::Paused,
        }
    }

    /// True while a session is open (Recording or Paused).
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Phase::Recording)
    }

    pub fn is_manual_pause(&self) -> bool {
        matches!(self, Phase::Paused { manual: true, .. })
    }

    /// Computes the next phase and the effect to apply.
    ///
    /// # Arguments
    ///
    /// * `event` - What happened
    /// * `now` - Monotonic time of the event
    #[must_use]
    pub fn next(self, event: SessionEvent, now: Duration) -> (Phase, Effect) {
        use SessionEvent as E;

        match (self, event) {
            (Phase::Idle, E::Start) => (Phase::Recording, Effect::OpenLog),

            (Phase::Recording, E::Inactive) => (
                Phase::Paused { manual: false, since: now },
                Effect::Flush,
            ),
            (Phase::Recording, E::Pause) => (
                Phase::Paused { manual: true, since: now },
                Effect::Flush,
            ),

            (Phase::Paused { manual: false, since }, E::Motion)
            | (Phase::Paused { since, .. }, E::Start) => (
                Phase::Recording,
                Effect::Resume {
                    paused_for: now.saturating_sub(since),
                },
            ),

            (Phase::Recording | Phase::Paused { .. }, E::Stop) => (Phase::Idle, Effect::CloseLog),
            (Phase::Recording | Phase::Paused { .. }, E::Discard) => (Phase::Idle, Effect::DeleteLog),

            (phase, _) => (phase, Effect::None),
        }
    }
}

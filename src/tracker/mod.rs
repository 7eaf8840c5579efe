//! # Tracker Module
//!
//! Shared session core and the command surface exposed to request handlers.
//!
//! The session context, log buffer, track history and published snapshot sit
//! behind one `tokio::sync::Mutex`. Callers acquire it with a budget that
//! depends on who they are:
//!
//! | Caller | Acquisition |
//! |--------|-------------|
//! | Sampler publish | `try_lock`, skipped on contention |
//! | Sampler logic/flush | `locking.sampler_timeout_ms` |
//! | Commands, status and file queries | `locking.command_timeout_ms` |
//! | `start`, `stop` | `locking.critical_timeout_ms` |
//!
//! A timed-out acquisition returns [`TrackerError::Busy`] and changes nothing.
//! Storage calls made while holding the lock are bounded by
//! `locking.storage_write_timeout_ms`.

pub mod sampler;

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::session::context::AdmissionPolicy;
use crate::session::{Effect, SessionContext, SessionEvent, SessionState};
use crate::storage::{validate_log_name, LogHandle, LogInfo, LogStorage};
use crate::telemetry::record::{format_record, CSV_HEADER};
use crate::telemetry::{FlushPolicy, LogBuffer, Reading, TelemetrySnapshot, TrackHistory, TrackPoint};

pub use sampler::{Sampler, TickReport};

/// Attempts at finding a free log name within one second.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Lock acquisition tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTier {
    Sampler,
    Command,
    Critical,
}

/// Session policy and lock budgets, resolved from [`Config`]
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub auto_pause_timeout: Duration,
    pub admission: AdmissionPolicy,
    pub flush: FlushPolicy,
    pub file_prefix: String,
    pub max_listed_files: usize,
    pub track_history_len: usize,
    pub sampler_timeout: Duration,
    pub command_timeout: Duration,
    pub critical_timeout: Duration,
    pub storage_timeout: Duration,
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        Self {
            auto_pause_timeout: config.session.auto_pause_timeout(),
            admission: AdmissionPolicy {
                min_distance_m: config.log.min_distance_m,
                admit_stationary: config.log.admit_stationary,
            },
            flush: FlushPolicy::from(&config.log),
            file_prefix: config.log.file_prefix.clone(),
            max_listed_files: config.log.max_listed_files,
            track_history_len: config.session.track_history_len,
            sampler_timeout: config.locking.sampler_timeout(),
            command_timeout: config.locking.command_timeout(),
            critical_timeout: config.locking.critical_timeout(),
            storage_timeout: config.locking.storage_write_timeout(),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// What one logic step did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// New state if an automatic transition fired.
    pub transition: Option<SessionState>,
    pub admitted: bool,
    pub flushed: bool,
}

/// State guarded by the shared lock
struct Core {
    session: SessionContext,
    buffer: LogBuffer,
    track: TrackHistory,
    snapshot: TelemetrySnapshot,
    last_reading: Reading,
    tick: u64,
}

impl Core {
    /// Rebuilds the snapshot from the last tick's reading and the current
    /// session, so a command's effect is visible without waiting a tick.
    fn refresh(&mut self, now: Duration) {
        self.snapshot = TelemetrySnapshot::capture(&self.last_reading, &self.session, self.tick, now);
    }
}

struct Inner {
    core: Mutex<Core>,
    storage: Arc<dyn LogStorage>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
}

/// Handle to the shared tracker core (cheap to clone)
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Creates a tracker in Idle state with an empty buffer.
    ///
    /// # Arguments
    ///
    /// * `settings` - Session policy and lock budgets
    /// * `storage` - Where session logs are written
    /// * `clock` - Time source shared with the sampler
    pub fn new(settings: TrackerSettings, storage: Arc<dyn LogStorage>, clock: Arc<dyn Clock>) -> Self {
        let core = Core {
            session: SessionContext::new(),
            buffer: LogBuffer::new(settings.flush),
            track: TrackHistory::new(settings.track_history_len),
            snapshot: TelemetrySnapshot::default(),
            last_reading: Reading::default(),
            tick: 0,
        };

        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(core),
                storage,
                clock,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.inner.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    fn budget(&self, tier: LockTier) -> Duration {
        let s = &self.inner.settings;
        match tier {
            LockTier::Sampler => s.sampler_timeout,
            LockTier::Command => s.command_timeout,
            LockTier::Critical => s.critical_timeout,
        }
    }

    async fn lock(&self, tier: LockTier, op: &'static str) -> Result<MutexGuard<'_, Core>> {
        match timeout(self.budget(tier), self.inner.core.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                debug!("{} timed out waiting for the session lock", op);
                Err(TrackerError::Busy(op))
            }
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = io::Result<T>>) -> io::Result<T> {
        match timeout(self.inner.settings.storage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "storage operation timed out")),
        }
    }

    /// Writes the whole buffer to the active log. On failure the buffer is
    /// left intact for the next attempt.
    async fn flush(&self, core: &mut Core, now: Duration) -> bool {
        if core.buffer.is_empty() {
            return true;
        }
        let Some(log) = core.session.active_log().cloned() else {
            return false;
        };

        let bytes = core.buffer.len();
        match self.bounded(self.inner.storage.append(log.name(), core.buffer.pending())).await {
            Ok(()) => {
                core.buffer.mark_flushed(now);
                debug!("Flushed {} bytes to {}", bytes, log);
                true
            }
            Err(e) => {
                warn!("Flush of {} bytes to {} failed, keeping buffer: {}", bytes, log, e);
                false
            }
        }
    }

    /// Creates the next free log. The whole search, every storage call
    /// included, is bounded by the critical budget.
    async fn open_log(&self) -> io::Result<LogHandle> {
        match timeout(self.inner.settings.critical_timeout, self.find_and_create_log()).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "opening a log timed out")),
        }
    }

    async fn find_and_create_log(&self) -> io::Result<LogHandle> {
        let stamp = self.inner.clock.wall().format("%Y%m%d_%H%M%S").to_string();
        let prefix = &self.inner.settings.file_prefix;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}{}.csv", prefix, stamp)
            } else {
                format!("{}{}_{}.csv", prefix, stamp, attempt)
            };

            if self.bounded(self.inner.storage.exists(&name)).await? {
                continue;
            }

            self.bounded(self.inner.storage.create(&name, CSV_HEADER.as_bytes())).await?;
            return Ok(LogHandle::new(name));
        }

        Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free log name"))
    }

    // ------------------------------------------------------------------
    // Sampler entry points
    // ------------------------------------------------------------------

    /// Logic part of a tick: automatic transitions, admission, flush.
    ///
    /// Time is read after the lock is taken, so it never runs behind a
    /// command that held the lock first. At most one storage write is made.
    ///
    /// # Errors
    ///
    /// `Busy` if the lock was not obtained within the sampler budget; the
    /// tick's logic is then skipped entirely.
    pub(crate) async fn step(&self, reading: &Reading, moving: bool) -> Result<StepOutcome> {
        let mut guard = self.lock(LockTier::Sampler, "sampler step").await?;
        let core = &mut *guard;
        let now = self.inner.clock.now();
        let settings = &self.inner.settings;
        let mut outcome = StepOutcome::default();
        let mut flush_attempted = false;

        if let Some(event) = core.session.motion_event(moving, now, settings.auto_pause_timeout) {
            let (phase, effect) = core.session.phase().next(event, now);
            match effect {
                Effect::Flush => {
                    flush_attempted = !core.buffer.is_empty();
                    outcome.flushed = self.flush(core, now).await;
                    core.session.commit(phase, effect, now);
                    outcome.transition = Some(phase.state());
                    info!("Auto-paused after {:?} without motion", settings.auto_pause_timeout);
                }
                Effect::Resume { paused_for } => {
                    core.session.commit(phase, effect, now);
                    outcome.transition = Some(phase.state());
                    info!("Auto-resumed after {:.1}s pause", paused_for.as_secs_f64());
                }
                _ => {}
            }
        }

        if core.session.phase().is_recording() {
            if let Some(step_m) = core.session.admit(&reading.fix, &settings.admission) {
                core.buffer.append(&format_record(now, reading));
                core.session.record_point(&reading.fix, step_m);
                core.track.push(TrackPoint {
                    lat: reading.fix.lat,
                    lon: reading.fix.lon,
                    speed: reading.fix.speed_kmph,
                    alt: reading.held_altitude_m,
                    hdop: reading.fix.hdop,
                    elapsed_s: core.session.elapsed(now).as_secs(),
                });
                outcome.admitted = true;
            }
        }

        if !flush_attempted && core.session.phase().is_active() && core.buffer.should_flush(now) {
            outcome.flushed = self.flush(core, now).await;
        }

        Ok(outcome)
    }

    /// Publishes this tick's snapshot without waiting.
    ///
    /// Returns `false` if the lock was busy; the previous snapshot stays
    /// visible until the next successful publish. The publish time is read
    /// under the lock, so `published_at_ms` never goes backwards.
    pub(crate) fn publish(&self, reading: &Reading, tick: u64) -> bool {
        match self.inner.core.try_lock() {
            Ok(mut core) => {
                let now = self.inner.clock.now();
                core.last_reading = *reading;
                core.tick = tick;
                core.snapshot = TelemetrySnapshot::capture(reading, &core.session, tick, now);
                true
            }
            Err(_) => {
                debug!("Publish skipped for tick {}: lock busy", tick);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Session command surface
    // ------------------------------------------------------------------

    /// Starts a new session, or resumes a paused one.
    ///
    /// From Idle this creates a new log; if storage is unavailable the
    /// session does not start and the state stays Idle. While Recording it
    /// is a no-op.
    ///
    /// # Returns
    ///
    /// The session state after the command
    ///
    /// # Errors
    ///
    /// Only `Busy`, when the lock is not obtained within the critical budget
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(tracker: trail_logger::tracker::Tracker) -> trail_logger::error::Result<()> {
    /// use trail_logger::session::SessionState;
    ///
    /// let state = tracker.start().await?;
    /// assert_ne!(state, SessionState::Paused);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(&self) -> Result<SessionState> {
        let mut guard = self.lock(LockTier::Critical, "start").await?;
        let core = &mut *guard;
        let now = self.inner.clock.now();

        let (phase, effect) = core.session.phase().next(SessionEvent::Start, now);
        match effect {
            Effect::OpenLog => match self.open_log().await {
                Ok(log) => {
                    info!("Started session, logging to {}", log);
                    core.session.begin(log, now);
                    core.buffer.discard(now);
                    core.track.clear();
                }
                Err(e) => warn!("Cannot start session: {}", e),
            },
            Effect::Resume { paused_for } => {
                core.session.commit(phase, effect, now);
                info!("Resumed after {:.1}s pause", paused_for.as_secs_f64());
            }
            _ => debug!("start ignored while {}", core.session.state()),
        }

        core.refresh(now);
        Ok(core.session.state())
    }

    /// Resumes a paused session. Same entry point as [`Tracker::start`].
    pub async fn resume(&self) -> Result<SessionState> {
        self.start().await
    }

    /// Pauses a recording session and flushes the buffer.
    ///
    /// A manual pause is only left through `start`/`resume`; motion does not
    /// resume it. No-op unless Recording.
    pub async fn pause(&self) -> Result<SessionState> {
        let mut guard = self.lock(LockTier::Command, "pause").await?;
        let core = &mut *guard;
        let now = self.inner.clock.now();

        let (phase, effect) = core.session.phase().next(SessionEvent::Pause, now);
        if effect == Effect::Flush {
            self.flush(core, now).await;
            core.session.commit(phase, effect, now);
            info!("Paused by command");
        } else {
            debug!("pause ignored while {}", core.session.state());
        }

        core.refresh(now);
        Ok(core.session.state())
    }

    /// Ends the session, persisting everything buffered.
    ///
    /// If the final flush fails the session is left as it was, buffer
    /// included, so nothing admitted is lost; retry or discard.
    pub async fn stop(&self) -> Result<SessionState> {
        let mut guard = self.lock(LockTier::Critical, "stop").await?;
        let core = &mut *guard;
        let now = self.inner.clock.now();

        let (phase, effect) = core.session.phase().next(SessionEvent::Stop, now);
        if effect == Effect::CloseLog {
            if self.flush(core, now).await {
                let distance_km = core.session.total_distance_m() / 1000.0;
                if let Some(log) = core.session.commit(phase, effect, now) {
                    info!("Stopped. {} closed, total distance {:.2} km", log, distance_km);
                }
                core.buffer.discard(now);
            } else {
                warn!("Stop refused: final flush failed, session kept open");
            }
        } else {
            debug!("stop ignored while {}", core.session.state());
        }

        core.refresh(now);
        Ok(core.session.state())
    }

    /// Ends the session and deletes its log without writing the buffer.
    pub async fn discard(&self) -> Result<SessionState> {
        let mut guard = self.lock(LockTier::Command, "discard").await?;
        let core = &mut *guard;
        let now = self.inner.clock.now();

        let (phase, effect) = core.session.phase().next(SessionEvent::Discard, now);
        if effect == Effect::DeleteLog {
            core.buffer.discard(now);
            core.track.clear();
            if let Some(log) = core.session.commit(phase, effect, now) {
                match self.bounded(self.inner.storage.exists(log.name())).await {
                    Ok(true) => match self.bounded(self.inner.storage.delete(log.name())).await {
                        Ok(()) => info!("Discarded session, {} deleted", log),
                        Err(e) => warn!("Discarded session but could not delete {}: {}", log, e),
                    },
                    Ok(false) => info!("Discarded session, {} already gone", log),
                    Err(e) => warn!("Discarded session but could not check {}: {}", log, e),
                }
            }
        } else {
            debug!("discard ignored while {}", core.session.state());
        }

        core.refresh(now);
        Ok(core.session.state())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Copy of the latest published snapshot.
    ///
    /// # Errors
    ///
    /// `Busy` if the lock is not obtained within the command budget
    pub async fn status(&self) -> Result<TelemetrySnapshot> {
        let core = self.lock(LockTier::Command, "status").await?;
        Ok(core.snapshot)
    }

    /// Admitted points of the current session, oldest first.
    pub async fn recent_track(&self) -> Result<Vec<TrackPoint>> {
        let core = self.lock(LockTier::Command, "track").await?;
        Ok(core.track.to_vec())
    }

    /// Completed logs with their sizes, capped at `max_listed_files`.
    ///
    /// The active session's log is not listed.
    pub async fn list_logs(&self) -> Result<Vec<LogInfo>> {
        let core = self.lock(LockTier::Command, "list").await?;
        let mut logs = self.bounded(self.inner.storage.list()).await?;
        if let Some(active) = core.session.active_log() {
            logs.retain(|info| info.name != active.name());
        }
        logs.truncate(self.inner.settings.max_listed_files);
        Ok(logs)
    }

    /// Raw bytes of a completed or active log (flushed portion only).
    ///
    /// The lock is held only to check the log exists; the read itself runs
    /// unlocked so a long download does not stall the sampler.
    pub async fn read_log(&self, name: &str) -> Result<Bytes> {
        validate_log_name(name)?;
        {
            let _core = self.lock(LockTier::Command, "read").await?;
            if !self.bounded(self.inner.storage.exists(name)).await? {
                return Err(TrackerError::LogNotFound(name.to_string()));
            }
        }
        Ok(self.inner.storage.read(name).await?)
    }

    /// Deletes a stored log other than the active session's.
    pub async fn delete_log(&self, name: &str) -> Result<()> {
        validate_log_name(name)?;
        let core = self.lock(LockTier::Command, "delete").await?;

        if core.session.active_log().is_some_and(|log| log.name() == name) {
            return Err(TrackerError::ActiveLog(name.to_string()));
        }
        if !self.bounded(self.inner.storage.exists(name)).await? {
            return Err(TrackerError::LogNotFound(name.to_string()));
        }

        self.bounded(self.inner.storage.delete(name)).await?;
        info!("Deleted log {}", name);
        Ok(())
    }
}

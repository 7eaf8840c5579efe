//! # Trail Logger
//!
//! Records GPS tracks to CSV with automatic pause when the carrier stops.
//!
//! Usage: `trail-logger [config.toml]`. Commands are read line by line from
//! stdin (see [`trail_logger::console`]); replies go to stdout and logs to
//! stderr or the diagnostics log directory.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use trail_logger::clock::SystemClock;
use trail_logger::config::Config;
use trail_logger::console::{execute, Command};
use trail_logger::sensors::replay::ReplayFeed;
use trail_logger::sensors::{InertialSource, NoBattery, NoFix, PositionSource, PowerSource};
use trail_logger::storage::FsStorage;
use trail_logger::tracker::{Sampler, Tracker, TrackerSettings};

/// File name stem for the rolling diagnostics log
const DIAGNOSTICS_FILE: &str = "trail-logger.log";

/// Sensor sources selected at startup
struct Sources {
    position: Box<dyn PositionSource>,
    inertial: Option<Box<dyn InertialSource>>,
    power: Box<dyn PowerSource>,
}

/// Main entry point for Trail Logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or built-in defaults)
///    - Set up logging with tracing subscriber
///    - Open the log directory and select sensor sources
///
/// 2. **Main Loop**
///    - Run one sampler tick per `sampler.tick_interval_ms`
///    - Execute console commands concurrently with sampling
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop the active session so buffered points are written
///
/// # Errors
///
/// Returns error if the configuration is invalid, the log directory cannot
/// be created, or the replay file cannot be loaded.
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };

    let _guard = init_tracing(&config);

    info!("Trail Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let storage = FsStorage::open(&config.log.dir)
        .await
        .with_context(|| format!("opening log directory {}", config.log.dir))?;
    info!("Logging to {}", storage.root().display());

    let tracker = Tracker::new(
        TrackerSettings::from(&config),
        Arc::new(storage),
        Arc::new(SystemClock::new()),
    );

    let sources = build_sources(&config)?;
    let mut sampler = Sampler::new(tracker.clone(), sources.position, sources.inertial, sources.power, &config);

    let mut ticker = interval(config.sampler.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("Sampling every {:?}", config.sampler.tick_interval());
    info!("Type commands on stdin, press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sampler.tick().await;
                if let Some(state) = report.transition {
                    info!("Tick {}: session now {}", report.tick, state);
                }
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<Command>() {
                        Ok(command) => {
                            let tracker = tracker.clone();
                            tokio::spawn(async move {
                                println!("{}", execute(&tracker, &command).await);
                            });
                        }
                        Err(e) => println!("error: {}", e),
                    },
                    Ok(None) => {
                        debug!("stdin closed, console disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("stdin read failed, console disabled: {}", e);
                        stdin_open = false;
                    }
                }
            }

            // Graceful shutdown on Ctrl+C
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    match tracker.stop().await {
        Ok(state) => info!("Final session state: {}", state),
        Err(e) => warn!("Could not stop session on shutdown: {}", e),
    }

    info!("Trail Logger stopped after {} ticks", sampler.ticks());
    Ok(())
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` overrides `diagnostics.level`. With `diagnostics.log_dir` set,
/// output goes to a daily rolling file instead of stderr; the returned guard
/// must be held until exit so buffered lines are written.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.diagnostics.level));

    if config.diagnostics.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.diagnostics.log_dir, DIAGNOSTICS_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Selects the replay feed when configured, otherwise sources that report
/// no fix and no battery.
fn build_sources(config: &Config) -> Result<Sources> {
    if config.sampler.replay_path.is_empty() {
        warn!("No sensor sources configured, running without a position fix");
        return Ok(Sources {
            position: Box::new(NoFix),
            inertial: None,
            power: Box::new(NoBattery),
        });
    }

    let feed = ReplayFeed::load(&config.sampler.replay_path)
        .with_context(|| format!("loading replay feed {}", config.sampler.replay_path))?;
    info!("Replaying {} frames from {}", feed.len(), config.sampler.replay_path);

    let (position, inertial, power) = feed.into_sources();
    Ok(Sources {
        position: Box::new(position),
        inertial: Some(Box::new(inertial)),
        power: Box::new(power),
    })
}

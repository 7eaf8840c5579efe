//! # Log Record Format
//!
//! One CSV line per admitted point.
//!
//! | Column | Format |
//! |--------|--------|
//! | time_ms | monotonic ms since start |
//! | utc | RFC 3339 fix time, empty if unknown |
//! | lat, lon | 6 decimals |
//! | speed_kmh | 1 decimal, raw receiver speed |
//! | alt_m | 1 decimal, held altitude |
//! | hdop | 1 decimal |
//! | sats | integer |
//! | ax, ay, az | 2 decimals, 0.00 without IMU |
//! | battery_v | 2 decimals |

use chrono::SecondsFormat;
use std::fmt::Write;
use std::time::Duration;

use super::snapshot::Reading;

/// First line of every session log.
pub const CSV_HEADER: &str = "time_ms,utc,lat,lon,speed_kmh,alt_m,hdop,sats,ax,ay,az,battery_v\n";

/// Formats one record, newline-terminated.
pub fn format_record(now: Duration, reading: &Reading) -> String {
    let fix = &reading.fix;
    let accel = reading.accel.unwrap_or_default();
    let utc = fix
        .timestamp
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    let mut line = String::with_capacity(128);
    // Writing into a String cannot fail
    let _ = writeln!(
        line,
        "{},{},{:.6},{:.6},{:.1},{:.1},{:.1},{},{:.2},{:.2},{:.2},{:.2}",
        now.as_millis(),
        utc,
        fix.lat,
        fix.lon,
        fix.speed_kmph,
        reading.held_altitude_m,
        fix.hdop,
        fix.satellites,
        accel.x,
        accel.y,
        accel.z,
        reading.battery_v,
    );
    line
}

//! Universal time scale used on the wire.
//!
//! The mapping service counts time in 100 ns ticks since
//! 0001-01-01T00:00:00Z. The rest of the workspace uses microseconds since the
//! Unix epoch (`timestamp_us`), so both conversions live here.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Ticks per second on the universal time scale (100 ns resolution).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks per microsecond.
const TICKS_PER_MICROSECOND: i64 = 10;

/// Seconds between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_OFFSET_SECONDS: i64 = 719_162 * 24 * 60 * 60;

/// Unix epoch expressed in universal ticks.
pub const UNIX_EPOCH_TICKS: i64 = UNIX_EPOCH_OFFSET_SECONDS * TICKS_PER_SECOND;

/// A point in time on the universal time scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(i64);

impl Time {
    /// Create from raw universal ticks (the wire representation).
    #[inline]
    pub fn from_universal(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw universal ticks.
    #[inline]
    pub fn to_universal(self) -> i64 {
        self.0
    }

    /// Create from microseconds since the Unix epoch.
    ///
    /// Saturates at the largest representable time for timestamps beyond
    /// year 29227.
    #[inline]
    pub fn from_unix_micros(timestamp_us: u64) -> Self {
        let ticks = i64::try_from(timestamp_us)
            .ok()
            .and_then(|us| us.checked_mul(TICKS_PER_MICROSECOND))
            .and_then(|ticks| ticks.checked_add(UNIX_EPOCH_TICKS))
            .unwrap_or(i64::MAX);
        Self(ticks)
    }

    /// Microseconds since the Unix epoch, or `None` for times before 1970.
    pub fn to_unix_micros(self) -> Option<u64> {
        let ticks = self.0 - UNIX_EPOCH_TICKS;
        (ticks >= 0).then(|| (ticks / TICKS_PER_MICROSECOND) as u64)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Elapsed duration since `earlier`, saturating at zero.
    pub fn duration_since(self, earlier: Time) -> Duration {
        let ticks = (self.0 - earlier.0).max(0);
        ticks_to_duration(ticks)
    }
}

impl From<SystemTime> for Time {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(UNIX_EPOCH_TICKS + duration_to_ticks(after)),
            Err(e) => Self(UNIX_EPOCH_TICKS - duration_to_ticks(e.duration())),
        }
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + duration_to_ticks(rhs))
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Time {
        Time(self.0 - duration_to_ticks(rhs))
    }
}

#[inline]
fn duration_to_ticks(d: Duration) -> i64 {
    d.as_secs() as i64 * TICKS_PER_SECOND + (d.subsec_nanos() / 100) as i64
}

#[inline]
fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::new(
        (ticks / TICKS_PER_SECOND) as u64,
        ((ticks % TICKS_PER_SECOND) * 100) as u32,
    )
}

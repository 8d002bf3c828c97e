use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A point on a monotonic capture clock, in nanoseconds.
///
/// Every capture session timestamps its samples on its own clock, so a
/// `MediaTime` is only comparable with times from the same clock domain.
/// Use [`ClockBridge`](crate::processing::clock_bridge::ClockBridge) to move
/// a time from one domain to another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaTime(i64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Convert seconds to a time with nanosecond resolution (rounded).
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC).round() as i64)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Offset by a signed nanosecond delta, saturating at the ends of the range.
    pub fn offset_by(self, delta_nanos: i64) -> Self {
        Self(self.0.saturating_add(delta_nanos))
    }

    /// Signed distance `self - earlier` in nanoseconds.
    pub fn nanos_since(self, earlier: MediaTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: Duration) -> MediaTime {
        let nanos = i64::try_from(rhs.as_nanos()).unwrap_or(i64::MAX);
        self.offset_by(nanos)
    }
}

impl Sub<Duration> for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: Duration) -> MediaTime {
        let nanos = i64::try_from(rhs.as_nanos()).unwrap_or(i64::MAX);
        self.offset_by(-nanos)
    }
}

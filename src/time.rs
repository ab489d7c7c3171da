//! Nanosecond-precision timestamps.

use std::fmt;
use std::ops::{Add, Sub};

/// An opaque, strictly ordered point in time: nanoseconds since the Unix
/// epoch. The engine never interprets calendar fields; all interval
/// alignment is pure integer arithmetic on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TimePoint(i64);

impl TimePoint {
    /// Builds a `TimePoint` from a raw nanosecond count.
    #[inline]
    #[must_use]
    pub const fn from_unix_ns(ns: i64) -> Self {
        Self(ns)
    }

    /// Returns the nanosecond count since the Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Aligns this timestamp down to the nearest multiple of `interval_ns`.
    /// Used by the time and Heikin-Ashi bar policies to compute a bar's
    /// `startTime`.
    #[inline]
    #[must_use]
    pub fn align_to_interval(self, interval_ns: i64) -> Self {
        debug_assert!(interval_ns > 0);
        Self(self.0 - self.0.rem_euclid(interval_ns))
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Add<i64> for TimePoint {
    type Output = Self;
    fn add(self, rhs: i64) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for TimePoint {
    type Output = i64;
    fn sub(self, rhs: Self) -> i64 {
        self.0 - rhs.0
    }
}

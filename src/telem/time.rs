//! Time primitives for the telemetry protocol
//!
//! - `TimeStamp`: nanoseconds since the Unix epoch
//! - `TimeSpan`: a signed nanosecond duration
//! - `TimeRange`: a half-open interval `[start, end)`
//! - `Rate`: a sample rate in Hz

use crate::error::{Error, Result};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Nanoseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp(0);
    pub const MIN: TimeStamp = TimeStamp(i64::MIN);
    pub const MAX: TimeStamp = TimeStamp(i64::MAX);

    /// Current wall-clock time
    pub fn now() -> Self {
        TimeStamp(Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX))
    }

    pub fn nanos(self) -> i64 {
        self.0
    }

    /// Span from `self` to `other` (`other - self`)
    pub fn span(self, other: TimeStamp) -> TimeSpan {
        other - self
    }

    /// Whether the stamp lies inside the half-open range
    pub fn within(self, range: &TimeRange) -> bool {
        range.contains(self)
    }

    /// Range covering `span` starting at this stamp
    pub fn range(self, span: TimeSpan) -> TimeRange {
        if span.0 >= 0 {
            TimeRange::unchecked(self, self + span)
        } else {
            TimeRange::unchecked(self + span, self)
        }
    }
}

impl From<i64> for TimeStamp {
    fn from(nanos: i64) -> Self {
        TimeStamp(nanos)
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = Utc.timestamp_nanos(self.0);
        write!(f, "{}", dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))
    }
}

impl Add<TimeSpan> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, rhs: TimeSpan) -> TimeStamp {
        TimeStamp(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<TimeSpan> for TimeStamp {
    fn add_assign(&mut self, rhs: TimeSpan) {
        *self = *self + rhs;
    }
}

impl Sub<TimeSpan> for TimeStamp {
    type Output = TimeStamp;

    fn sub(self, rhs: TimeSpan) -> TimeStamp {
        TimeStamp(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign<TimeSpan> for TimeStamp {
    fn sub_assign(&mut self, rhs: TimeSpan) {
        *self = *self - rhs;
    }
}

impl Sub<TimeStamp> for TimeStamp {
    type Output = TimeSpan;

    fn sub(self, rhs: TimeStamp) -> TimeSpan {
        TimeSpan(self.0.saturating_sub(rhs.0))
    }
}

/// A signed duration in nanoseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan(0);
    pub const NANOSECOND: TimeSpan = TimeSpan(1);
    pub const MICROSECOND: TimeSpan = TimeSpan(1_000);
    pub const MILLISECOND: TimeSpan = TimeSpan(1_000_000);
    pub const SECOND: TimeSpan = TimeSpan(1_000_000_000);
    pub const MINUTE: TimeSpan = TimeSpan(60 * 1_000_000_000);
    pub const HOUR: TimeSpan = TimeSpan(3600 * 1_000_000_000);
    pub const MAX: TimeSpan = TimeSpan(i64::MAX);

    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn from_millis(millis: i64) -> Self {
        TimeSpan(millis.saturating_mul(1_000_000))
    }

    pub fn from_secs(secs: i64) -> Self {
        TimeSpan(secs.saturating_mul(1_000_000_000))
    }

    pub fn abs(self) -> Self {
        TimeSpan(self.0.saturating_abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn as_std(self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.0.max(0) as u64)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        if abs >= 1_000_000_000 {
            write!(f, "{}{:.3}s", sign, abs as f64 / 1e9)
        } else if abs >= 1_000_000 {
            write!(f, "{}{:.3}ms", sign, abs as f64 / 1e6)
        } else if abs >= 1_000 {
            write!(f, "{}{:.3}µs", sign, abs as f64 / 1e3)
        } else {
            write!(f, "{}{}ns", sign, abs)
        }
    }
}

impl Add for TimeSpan {
    type Output = TimeSpan;

    fn add(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimeSpan {
    type Output = TimeSpan;

    fn sub(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for TimeSpan {
    type Output = TimeSpan;

    fn neg(self) -> TimeSpan {
        TimeSpan(self.0.saturating_neg())
    }
}

impl Mul<i64> for TimeSpan {
    type Output = TimeSpan;

    fn mul(self, rhs: i64) -> TimeSpan {
        TimeSpan(self.0.saturating_mul(rhs))
    }
}

impl Div<i64> for TimeSpan {
    type Output = TimeSpan;

    /// Integer division, truncating toward zero
    fn div(self, rhs: i64) -> TimeSpan {
        TimeSpan(self.0 / rhs)
    }
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: TimeStamp,
    /// Exclusive end
    pub end: TimeStamp,
}

impl TimeRange {
    /// The full representable domain
    pub const MAX: TimeRange = TimeRange {
        start: TimeStamp::MIN,
        end: TimeStamp::MAX,
    };

    /// Create a range, rejecting `start > end`
    pub fn new(start: impl Into<TimeStamp>, end: impl Into<TimeStamp>) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start > end {
            return Err(Error::validation(format!(
                "time range start {} is after end {}",
                start.0, end.0
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a range the caller already knows to be ordered
    pub(crate) const fn unchecked(start: TimeStamp, end: TimeStamp) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> TimeSpan {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, stamp: TimeStamp) -> bool {
        stamp >= self.start && stamp < self.end
    }

    /// Whether two ranges share at least one instant
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Intersection with another range, if non-empty
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Clamp a stamp into `[start, end]`
    pub fn clamp(&self, stamp: TimeStamp) -> TimeStamp {
        stamp.max(self.start).min(self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.0, self.end.0)
    }
}

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(pub f64);

impl Rate {
    pub fn hz(value: f64) -> Self {
        Rate(value)
    }

    /// Interval between consecutive samples, truncated to whole nanoseconds
    pub fn period(&self) -> TimeSpan {
        TimeSpan((1e9 / self.0) as i64)
    }

    /// Span covered by `count` samples
    pub fn span(&self, count: usize) -> TimeSpan {
        self.period() * count as i64
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0 && self.period().0 > 0
    }
}

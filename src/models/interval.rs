//! Half-open UTC time intervals.
//!
//! All scheduling comparisons in this crate run on `[start, end)` intervals.
//! The half-open convention means two back-to-back meetings (one ending at
//! the instant the next starts) do not overlap, which is exactly the
//! semantics the slot generator and the conflict guard need.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new range. Callers are expected to pass `start < end`;
    /// use [`TimeRange::is_valid`] to check ranges from untrusted input.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when the range is non-empty (`start < end`).
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Strict half-open overlap test: `[a, b)` and `[c, d)` overlap
    /// iff `a < d && c < b`.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely within `self`.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Expand the range by buffer padding on each side.
    pub fn padded(&self, before: Duration, after: Duration) -> TimeRange {
        TimeRange {
            start: self.start - before,
            end: self.end + after,
        }
    }

    /// Length of the range.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

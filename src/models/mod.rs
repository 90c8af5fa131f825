//! Domain model for the booking scheduler.
//!
//! These types are shared across the slot generator, the conflict guard,
//! the lifecycle manager and the repository layer. All authoritative
//! instants are UTC; local wall-clock values appear only inside
//! [`AvailabilityWindow`] (host configuration) and [`CandidateSlot`]
//! (viewer-facing rendering).

pub mod interval;

pub use interval::TimeRange;

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a host (the owner of a bookable calendar).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HostId(i64);

impl HostId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Identifier of a bookable meeting type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MeetingTypeId(i64);

impl MeetingTypeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Identifier of a durable booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One recurring weekly opening on a host's calendar.
///
/// Wall-clock times are local to `timezone` and must not span midnight
/// (`start < end` on the same day). Windows are configured by the settings
/// collaborator and read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub meeting_type_id: MeetingTypeId,
    pub weekday: Weekday,
    /// Local opening time, minute precision.
    pub start: NaiveTime,
    /// Local closing time, minute precision. Exclusive.
    pub end: NaiveTime,
    /// IANA timezone the wall-clock times are declared in.
    pub timezone: Tz,
}

impl AvailabilityWindow {
    /// True when the window satisfies its same-day invariant.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// A bookable offering: duration plus the breathing room required around
/// bookings of this type. Treated as an immutable snapshot during a single
/// slot-generation or reservation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingType {
    pub id: MeetingTypeId,
    pub host_id: HostId,
    pub duration_min: u32,
    pub buffer_before_min: u32,
    pub buffer_after_min: u32,
    pub is_active: bool,
}

impl MeetingType {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_min))
    }

    pub fn buffer_before(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_before_min))
    }

    pub fn buffer_after(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_after_min))
    }
}

/// Guest contact details. Opaque to the scheduler; carried for the
/// collaborators that send confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub name: String,
    pub email: String,
}

/// Lifecycle state of a booking. Only `Scheduled` blocks calendar time;
/// the other three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// True for statuses that block time on the host's calendar.
    pub fn blocks_time(&self) -> bool {
        matches!(self, BookingStatus::Scheduled)
    }

    /// True for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }

    /// Stable string form used by the storage layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Parse the storage string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(BookingStatus::Scheduled),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable booking record.
///
/// Invariant protected by the whole subsystem: for a given host, no two
/// bookings with status `scheduled` may have overlapping `[start, end)`
/// ranges. Bookings are never deleted; cancellation is a status change.
/// Only `status` is mutable after creation; rescheduling is modelled as
/// cancel + new reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub host_id: HostId,
    pub meeting_type_id: MeetingTypeId,
    pub guest: GuestIdentity,
    pub range: TimeRange,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// True when this booking blocks time on the host's calendar.
    pub fn blocks_time(&self) -> bool {
        self.status.blocks_time()
    }
}

/// An ephemeral bookable slot produced by the generator.
///
/// Never persisted: it is valid only for the request that produced it and
/// may be stale the instant a concurrent booking lands in its range. The
/// local times are a viewer-timezone rendering for display; `range` (UTC)
/// stays authoritative for every comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSlot {
    pub range: TimeRange,
    pub start_local: DateTime<Tz>,
    pub end_local: DateTime<Tz>,
}

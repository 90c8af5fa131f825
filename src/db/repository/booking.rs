//! Booking repository trait: the only write path into the booking store.
//!
//! `insert_scheduled_if_free` is the serialization point the whole
//! subsystem leans on: concurrent reservations for the same host and
//! overlapping ranges must resolve so that exactly one succeeds. Backends
//! provide this with a storage-level exclusion constraint (Postgres) or a
//! per-host critical section (in-memory), never a process-wide lock.

use async_trait::async_trait;
use chrono::Duration;

use super::error::RepositoryResult;
use crate::models::{Booking, BookingId, BookingStatus, HostId, TimeRange};

/// Outcome of an atomic check-and-insert.
///
/// An overlap is a legitimate business outcome, not an error: the guard
/// turns it into `SlotTaken` and the caller offers the guest another slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    /// The booking was created with status `scheduled`.
    Created(Booking),
    /// An active booking already occupies (part of) the padded range.
    Overlap,
}

/// Repository trait for durable bookings.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Atomically insert `booking` (status `scheduled`) unless an active
    /// booking for the same host overlaps it once existing bookings are
    /// padded with `buffer_before`/`buffer_after`.
    ///
    /// The check and the insert happen as one unit; callers may assume
    /// all-or-nothing semantics even on error.
    async fn insert_scheduled_if_free(
        &self,
        booking: Booking,
        buffer_before: Duration,
        buffer_after: Duration,
    ) -> RepositoryResult<ReserveOutcome>;

    /// Fetch a booking by id.
    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Option<Booking>>;

    /// List the host's active (time-blocking) bookings intersecting `range`,
    /// from a strongly consistent view.
    async fn list_active_in_range(
        &self,
        host_id: HostId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<Booking>>;

    /// Compare-and-set the booking's status: transition `id` from `from` to
    /// `to` only if its current status is still `from`.
    ///
    /// Returns the updated booking, or `None` when the precondition failed
    /// (the status changed concurrently). Unknown ids are a `NotFound`
    /// error, not a failed precondition.
    async fn update_status_if(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> RepositoryResult<Option<Booking>>;
}

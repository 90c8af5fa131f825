//! In-memory repository for unit testing and local development.
//!
//! The booking store is sharded per host: each host's calendar sits behind
//! its own mutex, so the atomic check-and-insert serializes reservations
//! for one host while disjoint hosts proceed independently. The
//! cross-instance equivalent in production is the Postgres exclusion
//! constraint; this backend provides the same contract in-process.

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repository::{
    AvailabilityRepository, BookingRepository, RepositoryError, RepositoryResult, ReserveOutcome,
};
use crate::models::{
    AvailabilityWindow, Booking, BookingId, BookingStatus, HostId, MeetingType, MeetingTypeId,
    TimeRange,
};

type CalendarShard = Arc<Mutex<Vec<Booking>>>;

/// In-memory implementation of the repository traits.
#[derive(Default)]
pub struct LocalRepository {
    meeting_types: RwLock<HashMap<MeetingTypeId, MeetingType>>,
    windows: RwLock<HashMap<MeetingTypeId, Vec<AvailabilityWindow>>>,
    calendars: RwLock<HashMap<HostId, CalendarShard>>,
    booking_hosts: RwLock<HashMap<BookingId, HostId>>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the per-host calendar shard. The outer map lock is
    /// held only long enough to clone the shard handle.
    fn shard(&self, host_id: HostId) -> CalendarShard {
        if let Some(shard) = self.calendars.read().get(&host_id) {
            return Arc::clone(shard);
        }
        Arc::clone(
            self.calendars
                .write()
                .entry(host_id)
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }
}

#[async_trait]
impl AvailabilityRepository for LocalRepository {
    async fn get_meeting_type(
        &self,
        id: MeetingTypeId,
    ) -> RepositoryResult<Option<MeetingType>> {
        Ok(self.meeting_types.read().get(&id).cloned())
    }

    async fn put_meeting_type(&self, meeting_type: MeetingType) -> RepositoryResult<()> {
        self.meeting_types
            .write()
            .insert(meeting_type.id, meeting_type);
        Ok(())
    }

    async fn list_windows(
        &self,
        meeting_type_id: MeetingTypeId,
    ) -> RepositoryResult<Vec<AvailabilityWindow>> {
        Ok(self
            .windows
            .read()
            .get(&meeting_type_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_windows(
        &self,
        meeting_type_id: MeetingTypeId,
        windows: Vec<AvailabilityWindow>,
    ) -> RepositoryResult<()> {
        self.windows.write().insert(meeting_type_id, windows);
        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl BookingRepository for LocalRepository {
    async fn insert_scheduled_if_free(
        &self,
        booking: Booking,
        buffer_before: Duration,
        buffer_after: Duration,
    ) -> RepositoryResult<ReserveOutcome> {
        if !booking.range.is_valid() {
            return Err(RepositoryError::validation(
                "booking range must satisfy start < end",
            ));
        }
        if booking.status != BookingStatus::Scheduled {
            return Err(RepositoryError::validation(
                "reservations must be inserted with status 'scheduled'",
            ));
        }

        let shard = self.shard(booking.host_id);
        let mut calendar = shard.lock();

        // Check-and-insert under the host lock: this is the mutual
        // exclusion the non-overlap invariant depends on.
        let taken = calendar.iter().any(|existing| {
            existing.blocks_time()
                && existing
                    .range
                    .padded(buffer_before, buffer_after)
                    .overlaps(&booking.range)
        });
        if taken {
            return Ok(ReserveOutcome::Overlap);
        }

        calendar.push(booking.clone());
        self.booking_hosts
            .write()
            .insert(booking.id, booking.host_id);
        Ok(ReserveOutcome::Created(booking))
    }

    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Option<Booking>> {
        let Some(host_id) = self.booking_hosts.read().get(&id).copied() else {
            return Ok(None);
        };
        let shard = self.shard(host_id);
        let calendar = shard.lock();
        Ok(calendar.iter().find(|b| b.id == id).cloned())
    }

    async fn list_active_in_range(
        &self,
        host_id: HostId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<Booking>> {
        let shard = self.shard(host_id);
        let calendar = shard.lock();
        Ok(calendar
            .iter()
            .filter(|b| b.blocks_time() && b.range.overlaps(&range))
            .cloned()
            .collect())
    }

    async fn update_status_if(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> RepositoryResult<Option<Booking>> {
        let Some(host_id) = self.booking_hosts.read().get(&id).copied() else {
            return Err(RepositoryError::not_found(format!("booking {id}")));
        };
        let shard = self.shard(host_id);
        let mut calendar = shard.lock();
        let Some(booking) = calendar.iter_mut().find(|b| b.id == id) else {
            return Err(RepositoryError::not_found(format!("booking {id}")));
        };
        if booking.status != from {
            return Ok(None);
        }
        booking.status = to;
        Ok(Some(booking.clone()))
    }
}

//! Conflict guard: admission control for new reservations.
//!
//! Candidate slots can be arbitrarily stale by the time a guest submits
//! one: another guest may have booked an overlapping range milliseconds
//! earlier. The guard therefore never trusts the candidate: it re-derives
//! the host's current availability and delegates the final overlap
//! decision to the repository's atomic check-and-insert.
//!
//! Business conflicts (`SlotTaken`, `WindowNoLongerValid`, `PastOrTooSoon`)
//! are first-class outcomes returned to the caller, never retried and
//! never logged as errors. Transient storage failures are retried a
//! bounded number of times with doubling backoff before surfacing
//! `StorageUnavailable`; every storage round-trip carries an explicit
//! timeout so a degraded store cannot hang the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::repository::{
    AvailabilityRepository, BookingRepository, FullRepository, ReserveOutcome,
};
use crate::models::{
    AvailabilityWindow, Booking, BookingId, BookingStatus, GuestIdentity, HostId, MeetingType,
    MeetingTypeId, TimeRange,
};
use crate::slots::window_utc_range;

/// Why a reservation was refused. Expected outcomes the caller surfaces
/// to the guest (pick another slot, refresh the list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// An active booking already overlaps the requested range.
    SlotTaken,
    /// The host's availability changed between listing and reservation.
    WindowNoLongerValid,
    /// Candidate start is in the past or violates the minimum notice.
    PastOrTooSoon,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictReason::SlotTaken => "slot_taken",
            ConflictReason::WindowNoLongerValid => "window_no_longer_valid",
            ConflictReason::PastOrTooSoon => "past_or_too_soon",
        };
        f.write_str(s)
    }
}

/// Reservation failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReserveError {
    /// Malformed request rejected before any storage work.
    #[error("invalid reservation request: {0}")]
    InvalidRequest(String),
    /// Expected business conflict.
    #[error("reservation conflict: {0}")]
    Conflict(ConflictReason),
    /// The booking store is degraded; no booking was created and the
    /// caller may retry the full request.
    #[error("booking store unavailable: {0}")]
    StorageUnavailable(String),
}

/// A reservation attempt for a specific candidate range.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub host_id: HostId,
    pub meeting_type_id: MeetingTypeId,
    pub range: TimeRange,
    pub guest: GuestIdentity,
}

/// Tunable admission policy.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    /// Minimum notice between "now" and a candidate start.
    pub min_notice: Duration,
    /// Bounded retries for transient storage failures.
    pub max_retries: u32,
    /// Initial retry delay; doubles with each attempt.
    pub retry_delay: std::time::Duration,
    /// Per-round-trip storage timeout.
    pub storage_timeout: std::time::Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            min_notice: Duration::zero(),
            max_retries: 3,
            retry_delay: std::time::Duration::from_millis(100),
            storage_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl GuardPolicy {
    /// Read policy overrides from the environment.
    ///
    /// - `SLOTCAL_MIN_NOTICE_MIN`: minimum notice in minutes (default: 0)
    /// - `SLOTCAL_MAX_RETRIES`: storage retry attempts (default: 3)
    /// - `SLOTCAL_RETRY_DELAY_MS`: initial retry delay (default: 100)
    /// - `SLOTCAL_STORAGE_TIMEOUT_SEC`: storage timeout (default: 5)
    pub fn from_env() -> Self {
        let parse = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok());
        let defaults = Self::default();
        Self {
            min_notice: parse("SLOTCAL_MIN_NOTICE_MIN")
                .map(|m| Duration::minutes(m as i64))
                .unwrap_or(defaults.min_notice),
            max_retries: parse("SLOTCAL_MAX_RETRIES")
                .map(|r| r as u32)
                .unwrap_or(defaults.max_retries),
            retry_delay: parse("SLOTCAL_RETRY_DELAY_MS")
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            storage_timeout: parse("SLOTCAL_STORAGE_TIMEOUT_SEC")
                .map(std::time::Duration::from_secs)
                .unwrap_or(defaults.storage_timeout),
        }
    }
}

/// The serialization point for all reservation attempts.
pub struct ConflictGuard {
    repository: Arc<dyn FullRepository>,
    policy: GuardPolicy,
}

impl ConflictGuard {
    pub fn new(repository: Arc<dyn FullRepository>, policy: GuardPolicy) -> Self {
        Self { repository, policy }
    }

    /// Attempt to durably reserve the candidate range.
    ///
    /// `now` is explicit so tests never depend on wall-clock time. On
    /// success the booking exists with status `scheduled`; on any error
    /// no booking was created.
    pub async fn reserve(
        &self,
        request: &ReserveRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, ReserveError> {
        if !request.range.is_valid() {
            return Err(ReserveError::InvalidRequest(
                "candidate range must satisfy start < end".to_string(),
            ));
        }
        if request.guest.email.trim().is_empty() {
            return Err(ReserveError::InvalidRequest(
                "guest email must not be empty".to_string(),
            ));
        }
        if request.range.start < now + self.policy.min_notice {
            return Err(ReserveError::Conflict(ConflictReason::PastOrTooSoon));
        }

        // Snapshot the current configuration. A missing, deactivated or
        // reassigned meeting type means the advertised slot no longer
        // exists.
        let meeting_type = self
            .storage_read("get_meeting_type", || {
                self.repository.get_meeting_type(request.meeting_type_id)
            })
            .await?
            .ok_or(ReserveError::Conflict(ConflictReason::WindowNoLongerValid))?;
        if !meeting_type.is_active || meeting_type.host_id != request.host_id {
            return Err(ReserveError::Conflict(ConflictReason::WindowNoLongerValid));
        }
        if request.range.duration() != meeting_type.duration() {
            return Err(ReserveError::Conflict(ConflictReason::WindowNoLongerValid));
        }

        let windows = self
            .storage_read("list_windows", || {
                self.repository.list_windows(request.meeting_type_id)
            })
            .await?;
        if !candidate_within_windows(&windows, &request.range) {
            return Err(ReserveError::Conflict(ConflictReason::WindowNoLongerValid));
        }

        let booking = Booking {
            id: BookingId::generate(),
            host_id: request.host_id,
            meeting_type_id: request.meeting_type_id,
            guest: request.guest.clone(),
            range: request.range,
            status: BookingStatus::Scheduled,
            created_at: now,
        };

        self.admit(booking, &meeting_type).await
    }

    /// Atomic check-and-insert with bounded retry of transient failures.
    /// `SlotTaken` is a final business outcome and is never retried.
    async fn admit(
        &self,
        booking: Booking,
        meeting_type: &MeetingType,
    ) -> Result<Booking, ReserveError> {
        let mut delay = self.policy.retry_delay;
        let mut attempt = 0u32;
        loop {
            let insert = self.repository.insert_scheduled_if_free(
                booking.clone(),
                meeting_type.buffer_before(),
                meeting_type.buffer_after(),
            );
            match tokio::time::timeout(self.policy.storage_timeout, insert).await {
                Err(_) => {
                    error!(
                        booking_id = %booking.id,
                        timeout_sec = self.policy.storage_timeout.as_secs(),
                        "reservation timed out against the booking store"
                    );
                    return Err(ReserveError::StorageUnavailable(
                        "reservation timed out".to_string(),
                    ));
                }
                Ok(Ok(ReserveOutcome::Created(created))) => {
                    info!(
                        booking_id = %created.id,
                        host_id = created.host_id.value(),
                        start = %created.range.start,
                        "reservation committed"
                    );
                    return Ok(created);
                }
                Ok(Ok(ReserveOutcome::Overlap)) => {
                    return Err(ReserveError::Conflict(ConflictReason::SlotTaken));
                }
                Ok(Err(e)) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        booking_id = %booking.id,
                        attempt,
                        error = %e,
                        "transient storage failure, retrying reservation"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Ok(Err(e)) => {
                    error!(booking_id = %booking.id, error = %e, "reservation failed");
                    return Err(ReserveError::StorageUnavailable(e.to_string()));
                }
            }
        }
    }

    /// Storage read with a per-attempt timeout. Transient failures are
    /// retried with the same bounded backoff as the insert path.
    async fn storage_read<T, F, Fut>(
        &self,
        operation: &'static str,
        mut query: F,
    ) -> Result<T, ReserveError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = crate::db::repository::RepositoryResult<T>>,
    {
        let mut delay = self.policy.retry_delay;
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(self.policy.storage_timeout, query()).await {
                Err(_) => {
                    error!(
                        operation,
                        timeout_sec = self.policy.storage_timeout.as_secs(),
                        "storage read timed out"
                    );
                    return Err(ReserveError::StorageUnavailable(format!(
                        "{operation} timed out"
                    )));
                }
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        error = %e,
                        "transient storage failure, retrying read"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Ok(Err(e)) => {
                    error!(operation, error = %e, "storage read failed");
                    return Err(ReserveError::StorageUnavailable(e.to_string()));
                }
            }
        }
    }
}

/// Check that the candidate still sits entirely inside a currently
/// configured window, projected for the candidate's date in the window's
/// own timezone.
fn candidate_within_windows(windows: &[AvailabilityWindow], range: &TimeRange) -> bool {
    windows.iter().filter(|w| w.is_well_formed()).any(|w| {
        use chrono::Datelike;
        let local_date = range.start.with_timezone(&w.timezone).date_naive();
        w.weekday == local_date.weekday()
            && window_utc_range(w, local_date).is_some_and(|p| p.contains(range))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        AvailabilityRepository, BookingRepository, RepositoryError, RepositoryResult,
    };
    use crate::db::LocalRepository;
    use async_trait::async_trait;
    use chrono::{NaiveTime, TimeZone, Weekday};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn meeting_type() -> MeetingType {
        MeetingType {
            id: MeetingTypeId::new(1),
            host_id: HostId::new(1),
            duration_min: 30,
            buffer_before_min: 0,
            buffer_after_min: 0,
            is_active: true,
        }
    }

    fn window() -> AvailabilityWindow {
        AvailabilityWindow {
            meeting_type_id: MeetingTypeId::new(1),
            weekday: Weekday::Mon,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            timezone: chrono_tz::UTC,
        }
    }

    fn guest(n: usize) -> GuestIdentity {
        GuestIdentity {
            name: format!("Guest {n}"),
            email: format!("guest{n}@example.com"),
        }
    }

    /// Monday 2026-03-02, 10:00-10:30 UTC.
    fn candidate() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    async fn seeded_repo() -> Arc<LocalRepository> {
        let repo = Arc::new(LocalRepository::new());
        repo.put_meeting_type(meeting_type()).await.unwrap();
        repo.replace_windows(MeetingTypeId::new(1), vec![window()])
            .await
            .unwrap();
        repo
    }

    fn request(range: TimeRange, n: usize) -> ReserveRequest {
        ReserveRequest {
            host_id: HostId::new(1),
            meeting_type_id: MeetingTypeId::new(1),
            range,
            guest: guest(n),
        }
    }

    #[tokio::test]
    async fn test_successful_reservation() {
        let repo = seeded_repo().await;
        let guard = ConflictGuard::new(repo.clone(), GuardPolicy::default());

        let booking = guard.reserve(&request(candidate(), 1), now()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Scheduled);
        assert_eq!(booking.range, candidate());
        assert!(repo.get_booking(booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_exactly_one_winner_among_concurrent_attempts() {
        let repo = seeded_repo().await;
        let guard = Arc::new(ConflictGuard::new(repo, GuardPolicy::default()));

        let n = 16;
        let mut handles = Vec::new();
        for i in 0..n {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move {
                guard.reserve(&request(candidate(), i), now()).await
            }));
        }

        let mut wins = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(ReserveError::Conflict(ConflictReason::SlotTaken)) => taken += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(taken, n - 1);
    }

    #[tokio::test]
    async fn test_disjoint_ranges_all_succeed_concurrently() {
        let repo = seeded_repo().await;
        let guard = Arc::new(ConflictGuard::new(repo, GuardPolicy::default()));

        let mut handles = Vec::new();
        for i in 0..6u32 {
            let guard = Arc::clone(&guard);
            let start = Utc.with_ymd_and_hms(2026, 3, 2, 9 + i, 0, 0).unwrap();
            let range = TimeRange::new(start, start + Duration::minutes(30));
            handles.push(tokio::spawn(async move {
                guard.reserve(&request(range, i as usize), now()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_past_candidate_is_refused() {
        let repo = seeded_repo().await;
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        let late_now = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        let err = guard
            .reserve(&request(candidate(), 1), late_now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::PastOrTooSoon)
        ));
    }

    #[tokio::test]
    async fn test_minimum_notice_is_enforced() {
        let repo = seeded_repo().await;
        let policy = GuardPolicy {
            min_notice: Duration::hours(48),
            ..GuardPolicy::default()
        };
        let guard = ConflictGuard::new(repo, policy);

        // 22 hours of notice is not enough against a 48-hour policy.
        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::PastOrTooSoon)
        ));
    }

    #[tokio::test]
    async fn test_deactivated_meeting_type_is_window_no_longer_valid() {
        let repo = seeded_repo().await;
        let mut mt = meeting_type();
        mt.is_active = false;
        repo.put_meeting_type(mt).await.unwrap();
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::WindowNoLongerValid)
        ));
    }

    #[tokio::test]
    async fn test_removed_window_is_window_no_longer_valid() {
        let repo = seeded_repo().await;
        repo.replace_windows(MeetingTypeId::new(1), Vec::new())
            .await
            .unwrap();
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::WindowNoLongerValid)
        ));
    }

    #[tokio::test]
    async fn test_wrong_duration_is_window_no_longer_valid() {
        let repo = seeded_repo().await;
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        let range = TimeRange::new(candidate().start, candidate().start + Duration::minutes(45));
        let err = guard.reserve(&request(range, 1), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::WindowNoLongerValid)
        ));
    }

    #[tokio::test]
    async fn test_candidate_outside_window_is_refused() {
        let repo = seeded_repo().await;
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        // Sunday is not covered by the Monday window.
        let start = Utc.with_ymd_and_hms(2026, 3, 8, 10, 0, 0).unwrap();
        let range = TimeRange::new(start, start + Duration::minutes(30));
        let err = guard.reserve(&request(range, 1), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::WindowNoLongerValid)
        ));
    }

    /// Repository double that fails a fixed number of times (inserts and
    /// meeting-type reads counted independently) before delegating to the
    /// inner store.
    struct FlakyRepository {
        inner: LocalRepository,
        insert_failures: AtomicU32,
        insert_attempts: AtomicU32,
        read_failures: AtomicU32,
        read_attempts: AtomicU32,
        retryable: bool,
    }

    impl FlakyRepository {
        fn take_failure(&self, failures: &AtomicU32) -> Option<RepositoryError> {
            let remaining = failures.load(Ordering::SeqCst);
            if remaining == 0 {
                return None;
            }
            failures.store(remaining - 1, Ordering::SeqCst);
            Some(if self.retryable {
                RepositoryError::connection("connection reset")
            } else {
                RepositoryError::query("relation does not exist")
            })
        }
    }

    #[async_trait]
    impl AvailabilityRepository for FlakyRepository {
        async fn get_meeting_type(
            &self,
            id: MeetingTypeId,
        ) -> RepositoryResult<Option<MeetingType>> {
            self.read_attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_failure(&self.read_failures) {
                return Err(err);
            }
            self.inner.get_meeting_type(id).await
        }

        async fn put_meeting_type(&self, meeting_type: MeetingType) -> RepositoryResult<()> {
            self.inner.put_meeting_type(meeting_type).await
        }

        async fn list_windows(
            &self,
            meeting_type_id: MeetingTypeId,
        ) -> RepositoryResult<Vec<AvailabilityWindow>> {
            self.inner.list_windows(meeting_type_id).await
        }

        async fn replace_windows(
            &self,
            meeting_type_id: MeetingTypeId,
            windows: Vec<AvailabilityWindow>,
        ) -> RepositoryResult<()> {
            self.inner.replace_windows(meeting_type_id, windows).await
        }

        async fn health_check(&self) -> RepositoryResult<bool> {
            self.inner.health_check().await
        }
    }

    #[async_trait]
    impl BookingRepository for FlakyRepository {
        async fn insert_scheduled_if_free(
            &self,
            booking: Booking,
            buffer_before: Duration,
            buffer_after: Duration,
        ) -> RepositoryResult<ReserveOutcome> {
            self.insert_attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_failure(&self.insert_failures) {
                return Err(err);
            }
            self.inner
                .insert_scheduled_if_free(booking, buffer_before, buffer_after)
                .await
        }

        async fn get_booking(&self, id: BookingId) -> RepositoryResult<Option<Booking>> {
            self.inner.get_booking(id).await
        }

        async fn list_active_in_range(
            &self,
            host_id: HostId,
            range: TimeRange,
        ) -> RepositoryResult<Vec<Booking>> {
            self.inner.list_active_in_range(host_id, range).await
        }

        async fn update_status_if(
            &self,
            id: BookingId,
            from: BookingStatus,
            to: BookingStatus,
        ) -> RepositoryResult<Option<Booking>> {
            self.inner.update_status_if(id, from, to).await
        }
    }

    async fn flaky_repo(
        insert_failures: u32,
        read_failures: u32,
        retryable: bool,
    ) -> Arc<FlakyRepository> {
        let inner = LocalRepository::new();
        inner.put_meeting_type(meeting_type()).await.unwrap();
        inner
            .replace_windows(MeetingTypeId::new(1), vec![window()])
            .await
            .unwrap();
        Arc::new(FlakyRepository {
            inner,
            insert_failures: AtomicU32::new(insert_failures),
            insert_attempts: AtomicU32::new(0),
            read_failures: AtomicU32::new(read_failures),
            read_attempts: AtomicU32::new(0),
            retryable,
        })
    }

    fn fast_retry_policy() -> GuardPolicy {
        GuardPolicy {
            retry_delay: std::time::Duration::from_millis(1),
            ..GuardPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let repo = flaky_repo(2, 0, true).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let booking = guard.reserve(&request(candidate(), 1), now()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Scheduled);
        assert_eq!(repo.insert_attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_storage_unavailable() {
        let repo = flaky_repo(10, 0, true).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::StorageUnavailable(_)));
        // Initial attempt plus max_retries.
        assert_eq!(repo.insert_attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let repo = flaky_repo(1, 0, false).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::StorageUnavailable(_)));
        assert_eq!(repo.insert_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_taken_is_not_retried() {
        let repo = flaky_repo(0, 0, true).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        guard.reserve(&request(candidate(), 1), now()).await.unwrap();
        let err = guard.reserve(&request(candidate(), 2), now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReserveError::Conflict(ConflictReason::SlotTaken)
        ));
        assert_eq!(repo.insert_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_read_failure_is_retried() {
        // One connection blip on the pre-check read never reaches the
        // caller; the reservation still lands.
        let repo = flaky_repo(0, 1, true).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let booking = guard.reserve(&request(candidate(), 1), now()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Scheduled);
        assert_eq!(repo.read_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_retry_exhaustion_surfaces_storage_unavailable() {
        let repo = flaky_repo(0, 10, true).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::StorageUnavailable(_)));
        // Initial attempt plus max_retries.
        assert_eq!(repo.read_attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_read_failure_is_not_retried() {
        let repo = flaky_repo(0, 1, false).await;
        let guard = ConflictGuard::new(repo.clone(), fast_retry_policy());

        let err = guard.reserve(&request(candidate(), 1), now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::StorageUnavailable(_)));
        assert_eq!(repo.read_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_storage() {
        let repo = seeded_repo().await;
        let guard = ConflictGuard::new(repo, GuardPolicy::default());

        let reversed = TimeRange::new(candidate().end, candidate().start);
        let err = guard.reserve(&request(reversed, 1), now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::InvalidRequest(_)));

        let mut no_email = request(candidate(), 1);
        no_email.guest.email = "  ".to_string();
        let err = guard.reserve(&no_email, now()).await.unwrap_err();
        assert!(matches!(err, ReserveError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_conflict_reason_wire_format() {
        let json = serde_json::to_string(&ConflictReason::WindowNoLongerValid).unwrap();
        assert_eq!(json, "\"window_no_longer_valid\"");
    }
}

//! Booking lifecycle: post-reservation status transitions.
//!
//! A booking starts `scheduled` and ends in exactly one terminal state:
//! `completed`, `cancelled` or `no_show`. The transition rules are pure
//! functions of the current status, the requested action and the clock;
//! persistence happens through a compare-and-set so a concurrent
//! transition can never be silently overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::repository::{BookingRepository, FullRepository, RepositoryError};
use crate::models::{Booking, BookingId, BookingStatus, TimeRange};

/// A caller-requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Guest or host calls the meeting off before it starts.
    Cancel,
    /// The meeting took place. Only allowed after the booking ends.
    Complete,
    /// The guest did not appear. Only allowed after the booking starts.
    NoShow,
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::Complete => "complete",
            LifecycleAction::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

/// Lifecycle transition failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LifecycleError {
    #[error("booking {0} not found")]
    NotFound(BookingId),
    #[error("cannot apply {action} to a booking in status {from}")]
    InvalidTransition {
        from: BookingStatus,
        action: LifecycleAction,
    },
    #[error("booking store unavailable: {0}")]
    StorageUnavailable(String),
}

/// Decide the next status for `action` against a booking in `status`
/// occupying `range`, evaluated at `now`.
///
/// `Ok(Some(next))` means the transition applies; `Ok(None)` means the
/// action is an idempotent no-op (completing an already completed
/// booking). Everything else is an [`LifecycleError::InvalidTransition`].
pub fn transition(
    status: BookingStatus,
    action: LifecycleAction,
    range: &TimeRange,
    now: DateTime<Utc>,
) -> Result<Option<BookingStatus>, LifecycleError> {
    let invalid = || LifecycleError::InvalidTransition {
        from: status,
        action,
    };

    match (status, action) {
        (BookingStatus::Scheduled, LifecycleAction::Cancel) => {
            // Cancellation only makes sense before the meeting begins.
            if now < range.start {
                Ok(Some(BookingStatus::Cancelled))
            } else {
                Err(invalid())
            }
        }
        (BookingStatus::Scheduled, LifecycleAction::Complete) => {
            if now >= range.end {
                Ok(Some(BookingStatus::Completed))
            } else {
                Err(invalid())
            }
        }
        (BookingStatus::Scheduled, LifecycleAction::NoShow) => {
            if now >= range.start {
                Ok(Some(BookingStatus::NoShow))
            } else {
                Err(invalid())
            }
        }
        // Completing twice is a safe no-op for retrying callers.
        (BookingStatus::Completed, LifecycleAction::Complete) => Ok(None),
        _ => Err(invalid()),
    }
}

/// Applies lifecycle actions against the booking store.
pub struct LifecycleManager {
    repository: Arc<dyn FullRepository>,
}

impl LifecycleManager {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }

    /// Apply `action` to the booking, returning its resulting record.
    ///
    /// The status write is a compare-and-set on the previously observed
    /// status. When the CAS loses to a concurrent transition the booking
    /// is re-read once and the action re-evaluated against the fresh
    /// status, so the caller gets the accurate outcome (for instance an
    /// idempotent `Ok` if someone else completed the booking first).
    pub async fn apply(
        &self,
        id: BookingId,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<Booking, LifecycleError> {
        let booking = self.fetch(id).await?;
        match self.try_apply(&booking, action, now).await? {
            Some(updated) => Ok(updated),
            None => {
                // Lost the CAS. One re-read settles the outcome.
                let fresh = self.fetch(id).await?;
                self.try_apply(&fresh, action, now)
                    .await?
                    .ok_or_else(|| LifecycleError::StorageUnavailable(
                        "booking status kept changing concurrently".to_string(),
                    ))
            }
        }
    }

    /// One evaluate-and-CAS round. `Ok(None)` means the CAS lost.
    async fn try_apply(
        &self,
        booking: &Booking,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, LifecycleError> {
        let next = match transition(booking.status, action, &booking.range, now)? {
            Some(next) => next,
            // Idempotent no-op: report the booking as-is.
            None => return Ok(Some(booking.clone())),
        };

        match self
            .repository
            .update_status_if(booking.id, booking.status, next)
            .await
        {
            Ok(Some(updated)) => {
                info!(
                    booking_id = %updated.id,
                    from = %booking.status,
                    to = %updated.status,
                    "booking transitioned"
                );
                Ok(Some(updated))
            }
            Ok(None) => Ok(None),
            Err(RepositoryError::NotFound { .. }) => Err(LifecycleError::NotFound(booking.id)),
            Err(e) => Err(LifecycleError::StorageUnavailable(e.to_string())),
        }
    }

    async fn fetch(&self, id: BookingId) -> Result<Booking, LifecycleError> {
        match self.repository.get_booking(id).await {
            Ok(Some(booking)) => Ok(booking),
            Ok(None) => Err(LifecycleError::NotFound(id)),
            Err(e) => Err(LifecycleError::StorageUnavailable(e.to_string())),
        }
    }
}

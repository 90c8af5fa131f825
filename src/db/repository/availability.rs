//! Availability repository trait: meeting-type and window configuration.
//!
//! Windows and meeting types are owned by the settings collaborator; the
//! scheduler reads them, and the only write path is the narrow config-sync
//! surface (`put_meeting_type` / `replace_windows`) that collaborator calls.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{AvailabilityWindow, MeetingType, MeetingTypeId};

/// Repository trait for host availability configuration.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Fetch a meeting type snapshot, or `None` if it was never configured.
    async fn get_meeting_type(
        &self,
        id: MeetingTypeId,
    ) -> RepositoryResult<Option<MeetingType>>;

    /// Create or replace a meeting type definition.
    async fn put_meeting_type(&self, meeting_type: MeetingType) -> RepositoryResult<()>;

    /// List the recurring availability windows for a meeting type.
    /// Returns an empty list for unknown ids.
    async fn list_windows(
        &self,
        meeting_type_id: MeetingTypeId,
    ) -> RepositoryResult<Vec<AvailabilityWindow>>;

    /// Replace the full window set for a meeting type in one operation,
    /// so readers never observe a half-updated weekly pattern.
    async fn replace_windows(
        &self,
        meeting_type_id: MeetingTypeId,
        windows: Vec<AvailabilityWindow>,
    ) -> RepositoryResult<()>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;
}

//! Repository traits: the abstract interface over the booking store.
//!
//! Traits are split by concern (availability configuration vs. durable
//! bookings), with [`FullRepository`] as the convenience bound the
//! application layer holds (`Arc<dyn FullRepository>`).

pub mod availability;
pub mod booking;
pub mod error;

pub use availability::AvailabilityRepository;
pub use booking::{BookingRepository, ReserveOutcome};
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// Marker trait combining every repository concern.
pub trait FullRepository: AvailabilityRepository + BookingRepository {}

impl<T: AvailabilityRepository + BookingRepository> FullRepository for T {}

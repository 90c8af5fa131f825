//! Booking store: repository pattern and persistence layer.
//!
//! The shared mutable resource of the whole subsystem is the booking
//! store behind these traits. All writes go through the conflict guard or
//! the lifecycle manager; slot generation only reads.
//!
//! # Architecture
//!
//! ```text
//! guard / lifecycle / http handlers
//!            │
//!   repository traits (repository/): abstract interface
//!            │
//!    ┌───────┴────────┐
//!    local (in-memory)  postgres (Diesel, exclusion constraint)
//! ```
//!
//! The Postgres backend is selected with the `postgres-repo` feature and
//! enforces the non-overlap invariant with a range exclusion constraint;
//! the local backend enforces it with per-host critical sections and is
//! the default for development and tests.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    AvailabilityRepository, BookingRepository, ErrorContext, FullRepository, RepositoryError,
    RepositoryResult, ReserveOutcome,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Initialize the global repository singleton for the configured backend.
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::from_env().map_err(|e| anyhow::Error::msg(e.to_string()))?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance, initializing it
/// from the environment on first use.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    if REPOSITORY.get().is_none() {
        init_repository()?;
    }

    REPOSITORY
        .get()
        .context("Booking store not initialized. Call init_repository() first.")
}

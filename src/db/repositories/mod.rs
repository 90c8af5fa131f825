//! Repository implementations module.
//!
//! This module contains the implementations of the repository traits:
//! - `postgres`: PostgreSQL implementation with Diesel ORM
//! - `local`: in-memory implementation for unit testing and local development
pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::{PostgresConfig, PostgresRepository};

//! # Slotcal
//!
//! Availability-driven booking scheduler.
//!
//! This crate turns a host's recurring weekly availability into concrete
//! bookable slots, admits reservations so that no two bookings of the same
//! host ever overlap, and drives each booking through its lifecycle. The
//! scheduler is exposed as a REST API via Axum.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: Domain types (windows, meeting types, bookings, intervals)
//! - [`slots`]: Pure slot generation from windows and existing bookings
//! - [`guard`]: Admission control for reservations (the conflict guard)
//! - [`lifecycle`]: Post-reservation status transitions
//! - [`db`]: Booking store, repository pattern, and persistence layer
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Time model
//!
//! Every stored or compared instant is UTC; intervals are half-open
//! `[start, end)`. Wall-clock times exist only at the edges: availability
//! windows are declared in the host's IANA timezone and projected to UTC
//! per calendar day, and slot listings carry a viewer-timezone rendering
//! for display.

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod guard;
pub mod lifecycle;
pub mod models;
pub mod slots;

#[cfg(feature = "http-server")]
pub mod http;

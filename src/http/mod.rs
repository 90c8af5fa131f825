//! HTTP server module for the booking scheduler.
//!
//! This module exposes the scheduler as a REST API on axum. It reuses the
//! core library's slot generator, conflict guard, lifecycle manager and
//! repository pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Request parsing and validation                         │
//! │  - JSON serialization/deserialization                     │
//! │  - CORS, compression, error handling                      │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Scheduling core (slots / guard / lifecycle)              │
//! │  - Slot generation                                        │
//! │  - Reservation admission, status transitions              │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! │  - Booking-store persistence                              │
//! │  - LocalRepository / PostgresRepository                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

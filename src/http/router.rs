//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API router with versioned endpoints
    let api_v1 = Router::new()
        // Slot discovery
        .route("/slots", get(handlers::list_slots))
        // Booking reservation and lifecycle
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{booking_id}", get(handlers::get_booking))
        .route("/bookings/{booking_id}", patch(handlers::transition_booking))
        // Configuration sync from the settings collaborator
        .route("/meeting-types/{id}", put(handlers::put_meeting_type))
        .route("/meeting-types/{id}/windows", put(handlers::put_windows));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

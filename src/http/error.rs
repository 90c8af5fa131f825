//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::guard::{ConflictReason, ReserveError};
use crate::lifecycle::LifecycleError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// Expected reservation conflict
    Conflict(ConflictReason),
    /// Lifecycle action not allowed in the booking's current state
    InvalidTransition(String),
    /// The booking store is degraded; the request may be retried
    ServiceUnavailable(String),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("not_found", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("bad_request", msg))
            }
            AppError::Conflict(reason) => (
                StatusCode::CONFLICT,
                ApiError::new(reason.to_string(), conflict_message(reason)),
            ),
            AppError::InvalidTransition(msg) => (
                StatusCode::CONFLICT,
                ApiError::new("invalid_transition", msg),
            ),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("storage_unavailable", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("internal_error", msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

fn conflict_message(reason: ConflictReason) -> &'static str {
    match reason {
        ConflictReason::SlotTaken => "The requested slot was just booked. Pick another slot.",
        ConflictReason::WindowNoLongerValid => {
            "The host's availability changed. Refresh the slot list."
        }
        ConflictReason::PastOrTooSoon => {
            "The requested start is in the past or too close to now."
        }
    }
}

impl From<ReserveError> for AppError {
    fn from(err: ReserveError) -> Self {
        match err {
            ReserveError::InvalidRequest(msg) => AppError::BadRequest(msg),
            ReserveError::Conflict(reason) => AppError::Conflict(reason),
            ReserveError::StorageUnavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(id) => AppError::NotFound(format!("booking {id} not found")),
            LifecycleError::InvalidTransition { .. } => {
                AppError::InvalidTransition(err.to_string())
            }
            LifecycleError::StorageUnavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match &err {
            RepositoryError::NotFound { .. } => AppError::NotFound(err.to_string()),
            RepositoryError::Connection { .. } | RepositoryError::Timeout { .. } => {
                AppError::ServiceUnavailable(err.to_string())
            }
            RepositoryError::Validation { .. } => AppError::BadRequest(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

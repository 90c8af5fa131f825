//! HTTP handlers for the REST API.
//!
//! Handlers parse and validate the wire types, then delegate to the slot
//! generator, the conflict guard or the lifecycle manager. All clock reads
//! happen here, at the edge; everything below takes `now` as an argument.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use super::dto::{
    BookingResponse, CreateBookingRequest, HealthResponse, MeetingTypeDto, SlotListResponse,
    SlotsQuery, TransitionRequest, WindowDto,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::repository::{AvailabilityRepository, BookingRepository};
use crate::guard::ReserveRequest;
use crate::models::{BookingId, HostId, MeetingTypeId, TimeRange};
use crate::slots::{generate_slots, SlotError, SlotQuery};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// GET /health
///
/// Verify the service is running and the booking store is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

/// GET /v1/slots
///
/// List bookable slots for a meeting type over an inclusive date range,
/// rendered in the viewer's timezone.
pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> HandlerResult<SlotListResponse> {
    let viewer_tz: chrono_tz::Tz = query
        .viewer_timezone
        .as_deref()
        .unwrap_or("UTC")
        .parse()
        .map_err(|_| {
            AppError::BadRequest(format!(
                "unknown viewer timezone: {}",
                query.viewer_timezone.as_deref().unwrap_or_default()
            ))
        })?;

    let meeting_type_id = MeetingTypeId::new(query.meeting_type_id);
    let meeting_type = state
        .repository
        .get_meeting_type(meeting_type_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("meeting type {} not found", query.meeting_type_id))
        })?;
    if meeting_type.host_id != HostId::new(query.host_id) {
        return Err(AppError::BadRequest(format!(
            "meeting type {} does not belong to host {}",
            query.meeting_type_id, query.host_id
        )));
    }

    let windows = state.repository.list_windows(meeting_type_id).await?;

    // Fetch a superset of the bookings that could affect the range: window
    // timezones can shift a local day across UTC midnight in either
    // direction, so widen by a day on each side.
    let midnight = NaiveTime::MIN;
    let fetch_range = TimeRange::new(
        Utc.from_utc_datetime(&(query.from - Duration::days(1)).and_time(midnight)),
        Utc.from_utc_datetime(&(query.to + Duration::days(2)).and_time(midnight)),
    );
    let bookings = state
        .repository
        .list_active_in_range(meeting_type.host_id, fetch_range)
        .await?;

    let slots = generate_slots(&SlotQuery {
        windows: &windows,
        bookings: &bookings,
        meeting_type: &meeting_type,
        from: query.from,
        to: query.to,
        granularity_min: query.granularity.unwrap_or(30),
        viewer_tz,
        now: Utc::now(),
    })
    .map_err(map_slot_error)?;

    let slots: Vec<_> = slots.into_iter().map(Into::into).collect();
    let total = slots.len();
    Ok(Json(SlotListResponse { slots, total }))
}

fn map_slot_error(err: SlotError) -> AppError {
    // All generation errors are caller errors; the distinction the client
    // needs is in the message.
    AppError::BadRequest(err.to_string())
}

/// POST /v1/bookings
///
/// Reserve a slot. Returns 201 with the booking on success, 409 with a
/// conflict reason when the slot cannot be taken.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let reserve = ReserveRequest {
        host_id: HostId::new(request.host_id),
        meeting_type_id: MeetingTypeId::new(request.meeting_type_id),
        range: TimeRange::new(request.start_utc, request.end_utc),
        guest: request.guest.into(),
    };

    let booking = state.guard.reserve(&reserve, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<BookingResponse> {
    let booking = state
        .repository
        .get_booking(BookingId::from_uuid(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;
    Ok(Json(booking.into()))
}

/// PATCH /v1/bookings/{id}
///
/// Apply a lifecycle action (cancel, complete, no_show) to a booking.
pub async fn transition_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> HandlerResult<BookingResponse> {
    let booking = state
        .lifecycle
        .apply(BookingId::from_uuid(id), request.action, Utc::now())
        .await?;
    Ok(Json(booking.into()))
}

/// PUT /v1/meeting-types/{id}
///
/// Upsert a meeting type. This is the sync surface for the settings
/// collaborator that owns meeting-type configuration.
pub async fn put_meeting_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(dto): Json<MeetingTypeDto>,
) -> Result<StatusCode, AppError> {
    let meeting_type = dto.into_domain(id).map_err(AppError::BadRequest)?;
    state.repository.put_meeting_type(meeting_type).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/meeting-types/{id}/windows
///
/// Replace the full set of availability windows for a meeting type.
pub async fn put_windows(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(dtos): Json<Vec<WindowDto>>,
) -> Result<StatusCode, AppError> {
    let meeting_type_id = MeetingTypeId::new(id);
    if state
        .repository
        .get_meeting_type(meeting_type_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("meeting type {id} not found")));
    }

    let windows = dtos
        .into_iter()
        .map(|dto| dto.into_domain(id))
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)?;

    state
        .repository
        .replace_windows(meeting_type_id, windows)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Request and response DTOs for the REST API.
//!
//! Wire types are kept separate from the domain model so the JSON surface
//! can stay stable while the internals move. Weekdays cross the wire as
//! integers with Monday = 0; timezones as IANA names.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AvailabilityWindow, Booking, BookingStatus, CandidateSlot, GuestIdentity, HostId, MeetingType,
    MeetingTypeId,
};

/// GET /health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Query parameters for GET /v1/slots.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub host_id: i64,
    pub meeting_type_id: i64,
    /// First calendar day of the range, inclusive.
    pub from: NaiveDate,
    /// Last calendar day of the range, inclusive.
    pub to: NaiveDate,
    /// IANA timezone for the local renderings. Defaults to UTC.
    pub viewer_timezone: Option<String>,
    /// Candidate stepping in minutes. Defaults to 30.
    pub granularity: Option<u32>,
}

/// One bookable slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDto {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// RFC 3339 rendering in the viewer's timezone, for display only.
    pub start_local: String,
    pub end_local: String,
}

impl From<CandidateSlot> for SlotDto {
    fn from(slot: CandidateSlot) -> Self {
        Self {
            start_utc: slot.range.start,
            end_utc: slot.range.end,
            start_local: slot.start_local.to_rfc3339(),
            end_local: slot.end_local.to_rfc3339(),
        }
    }
}

/// GET /v1/slots response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotListResponse {
    pub slots: Vec<SlotDto>,
    pub total: usize,
}

/// Guest contact details on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestDto {
    pub name: String,
    pub email: String,
}

impl From<GuestDto> for GuestIdentity {
    fn from(dto: GuestDto) -> Self {
        Self {
            name: dto.name,
            email: dto.email,
        }
    }
}

/// POST /v1/bookings request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub host_id: i64,
    pub meeting_type_id: i64,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub guest: GuestDto,
}

/// A booking as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub host_id: i64,
    pub meeting_type_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id.value(),
            host_id: booking.host_id.value(),
            meeting_type_id: booking.meeting_type_id.value(),
            guest_name: booking.guest.name,
            guest_email: booking.guest.email,
            start_utc: booking.range.start,
            end_utc: booking.range.end,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

/// PATCH /v1/bookings/{id} request body.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub action: crate::lifecycle::LifecycleAction,
}

/// PUT /v1/meeting-types/{id} request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingTypeDto {
    pub host_id: i64,
    pub duration_min: u32,
    pub buffer_before_min: u32,
    pub buffer_after_min: u32,
    pub is_active: bool,
}

impl MeetingTypeDto {
    pub fn into_domain(self, id: i64) -> Result<MeetingType, String> {
        if self.duration_min == 0 {
            return Err("duration_min must be positive".to_string());
        }
        Ok(MeetingType {
            id: MeetingTypeId::new(id),
            host_id: HostId::new(self.host_id),
            duration_min: self.duration_min,
            buffer_before_min: self.buffer_before_min,
            buffer_after_min: self.buffer_after_min,
            is_active: self.is_active,
        })
    }
}

/// One availability window on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDto {
    /// Day of week, Monday = 0 through Sunday = 6.
    pub weekday: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
}

impl WindowDto {
    pub fn into_domain(self, meeting_type_id: i64) -> Result<AvailabilityWindow, String> {
        let weekday = weekday_from_u8(self.weekday)
            .ok_or_else(|| format!("weekday must be 0-6 (Monday = 0), got {}", self.weekday))?;
        let timezone: chrono_tz::Tz = self
            .timezone
            .parse()
            .map_err(|_| format!("unknown timezone: {}", self.timezone))?;
        if self.start >= self.end {
            return Err(format!(
                "window start {} must be before end {} on the same day",
                self.start, self.end
            ));
        }
        Ok(AvailabilityWindow {
            meeting_type_id: MeetingTypeId::new(meeting_type_id),
            weekday,
            start: self.start,
            end: self.end,
            timezone,
        })
    }
}

fn weekday_from_u8(value: u8) -> Option<Weekday> {
    match value {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_dto_conversion() {
        let dto = WindowDto {
            weekday: 0,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            timezone: "America/New_York".to_string(),
        };
        let window = dto.into_domain(1).unwrap();
        assert_eq!(window.weekday, Weekday::Mon);
        assert_eq!(window.timezone, chrono_tz::America::New_York);
    }

    #[test]
    fn test_window_dto_rejects_bad_input() {
        let base = WindowDto {
            weekday: 0,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
        };

        let mut bad_day = base.clone();
        bad_day.weekday = 7;
        assert!(bad_day.into_domain(1).is_err());

        let mut bad_tz = base.clone();
        bad_tz.timezone = "Mars/Olympus_Mons".to_string();
        assert!(bad_tz.into_domain(1).is_err());

        let mut reversed = base;
        std::mem::swap(&mut reversed.start, &mut reversed.end);
        assert!(reversed.into_domain(1).is_err());
    }

    #[test]
    fn test_meeting_type_dto_rejects_zero_duration() {
        let dto = MeetingTypeDto {
            host_id: 1,
            duration_min: 0,
            buffer_before_min: 0,
            buffer_after_min: 0,
            is_active: true,
        };
        assert!(dto.into_domain(1).is_err());
    }
}

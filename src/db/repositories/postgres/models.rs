//! Row types and domain conversions for the Postgres backend.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use diesel::prelude::*;

use super::schema::{availability_windows, bookings, meeting_types};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{
    AvailabilityWindow, Booking, BookingId, BookingStatus, GuestIdentity, HostId, MeetingType,
    MeetingTypeId,
};

fn weekday_to_i16(weekday: Weekday) -> i16 {
    weekday.num_days_from_monday() as i16
}

fn weekday_from_i16(value: i16) -> RepositoryResult<Weekday> {
    match value {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(RepositoryError::validation(format!(
            "weekday column out of range: {other}"
        ))),
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = meeting_types)]
pub struct MeetingTypeRow {
    pub id: i64,
    pub host_id: i64,
    pub duration_min: i32,
    pub buffer_before_min: i32,
    pub buffer_after_min: i32,
    pub is_active: bool,
}

impl MeetingTypeRow {
    pub fn from_domain(mt: &MeetingType) -> Self {
        Self {
            id: mt.id.value(),
            host_id: mt.host_id.value(),
            duration_min: mt.duration_min as i32,
            buffer_before_min: mt.buffer_before_min as i32,
            buffer_after_min: mt.buffer_after_min as i32,
            is_active: mt.is_active,
        }
    }

    pub fn into_domain(self) -> RepositoryResult<MeetingType> {
        let minutes = |v: i32, field: &str| -> RepositoryResult<u32> {
            u32::try_from(v).map_err(|_| {
                RepositoryError::validation(format!("{field} column is negative: {v}"))
            })
        };
        Ok(MeetingType {
            id: MeetingTypeId::new(self.id),
            host_id: HostId::new(self.host_id),
            duration_min: minutes(self.duration_min, "duration_min")?,
            buffer_before_min: minutes(self.buffer_before_min, "buffer_before_min")?,
            buffer_after_min: minutes(self.buffer_after_min, "buffer_after_min")?,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct WindowRow {
    pub id: i64,
    pub meeting_type_id: i64,
    pub weekday: i16,
    pub start_local: NaiveTime,
    pub end_local: NaiveTime,
    pub timezone: String,
}

impl WindowRow {
    pub fn into_domain(self) -> RepositoryResult<AvailabilityWindow> {
        let timezone = self.timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            RepositoryError::validation(format!(
                "window {} carries an unknown timezone: {e}",
                self.id
            ))
        })?;
        Ok(AvailabilityWindow {
            meeting_type_id: MeetingTypeId::new(self.meeting_type_id),
            weekday: weekday_from_i16(self.weekday)?,
            start: self.start_local,
            end: self.end_local,
            timezone,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = availability_windows)]
pub struct NewWindowRow {
    pub meeting_type_id: i64,
    pub weekday: i16,
    pub start_local: NaiveTime,
    pub end_local: NaiveTime,
    pub timezone: String,
}

impl NewWindowRow {
    pub fn from_domain(window: &AvailabilityWindow) -> Self {
        Self {
            meeting_type_id: window.meeting_type_id.value(),
            weekday: weekday_to_i16(window.weekday),
            start_local: window.start,
            end_local: window.end,
            timezone: window.timezone.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = bookings)]
pub struct BookingRow {
    pub id: uuid::Uuid,
    pub host_id: i64,
    pub meeting_type_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl BookingRow {
    pub fn from_domain(booking: &Booking) -> Self {
        Self {
            id: booking.id.value(),
            host_id: booking.host_id.value(),
            meeting_type_id: booking.meeting_type_id.value(),
            guest_name: booking.guest.name.clone(),
            guest_email: booking.guest.email.clone(),
            start_utc: booking.range.start,
            end_utc: booking.range.end,
            status: booking.status.as_str().to_string(),
            created_at: booking.created_at,
        }
    }

    pub fn into_domain(self) -> RepositoryResult<Booking> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::validation(format!(
                "booking {} carries an unknown status: {}",
                self.id, self.status
            ))
        })?;
        Ok(Booking {
            id: BookingId::from_uuid(self.id),
            host_id: HostId::new(self.host_id),
            meeting_type_id: MeetingTypeId::new(self.meeting_type_id),
            guest: GuestIdentity {
                name: self.guest_name,
                email: self.guest_email,
            },
            range: crate::models::TimeRange::new(self.start_utc, self.end_utc),
            status,
            created_at: self.created_at,
        })
    }
}

//! Slot generation: turn recurring availability windows into bookable slots.
//!
//! [`generate_slots`] is a pure function: everything it needs, including the
//! "now" moment, arrives as an argument, so identical inputs always produce
//! identical output and tests never depend on wall-clock time. It performs
//! no I/O and is safe to run on any number of tasks in parallel.
//!
//! The caller supplies a superset of the host's active bookings for the
//! requested range; the generator never queries storage itself.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use tracing::warn;

use crate::models::{AvailabilityWindow, Booking, CandidateSlot, MeetingType, TimeRange};


/// Hard cap on the requested span. Keeps generation O(days × windows);
/// anything wider is a caller error, not a generator concern.
pub const MAX_RANGE_DAYS: i64 = 90;

/// Floor on the stepping granularity so output stays bounded.
pub const MIN_GRANULARITY_MIN: u32 = 5;

/// Inputs for one slot-generation call.
///
/// `from`/`to` are inclusive calendar dates. `bookings` must contain every
/// active booking for the host that could overlap the range.
#[derive(Debug, Clone)]
pub struct SlotQuery<'a> {
    pub windows: &'a [AvailabilityWindow],
    pub bookings: &'a [Booking],
    pub meeting_type: &'a MeetingType,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub granularity_min: u32,
    pub viewer_tz: Tz,
    pub now: DateTime<Utc>,
}

/// Input errors rejected before any generation runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("meeting type {0} is not active")]
    InactiveMeetingType(i64),
    #[error("meeting duration must be positive")]
    InvalidDuration,
    #[error("granularity of {0} minutes is below the 5-minute floor")]
    GranularityTooFine(u32),
    #[error("range start {from} is after range end {to}")]
    ReversedRange { from: NaiveDate, to: NaiveDate },
    #[error("requested span of {days} days exceeds the 90-day cap")]
    RangeTooWide { days: i64 },
}

/// Project a window's local wall-clock interval onto a specific calendar
/// date, yielding the UTC instants for that date.
///
/// DST handling follows the window's declared timezone, never the viewer's:
/// ambiguous local times (fall-back) resolve to the earliest mapping, and
/// nonexistent local times (the spring-forward gap) yield `None`, skipping
/// the window for that day.
pub fn window_utc_range(window: &AvailabilityWindow, date: NaiveDate) -> Option<TimeRange> {
    let open = window
        .timezone
        .from_local_datetime(&date.and_time(window.start))
        .earliest()?;
    let close = window
        .timezone
        .from_local_datetime(&date.and_time(window.end))
        .earliest()?;
    let range = TimeRange::new(open.with_timezone(&Utc), close.with_timezone(&Utc));
    range.is_valid().then_some(range)
}

/// Generate the ordered set of bookable slots for one meeting type.
///
/// For each calendar day in range, windows matching that day's weekday are
/// projected to UTC in their own timezone; candidate starts are then walked
/// in `granularity_min` steps. A candidate is emitted when the meeting fits
/// inside the window, starts at or after `now`, and clears every active
/// booking once the meeting type's buffers are applied as padding around
/// the existing bookings.
///
/// Malformed windows (`start >= end`) are skipped with a warning so one bad
/// row never blanks the whole calendar. Output is ascending by UTC start
/// and deduplicated across overlapping windows.
pub fn generate_slots(query: &SlotQuery<'_>) -> Result<Vec<CandidateSlot>, SlotError> {
    let mt = query.meeting_type;
    if !mt.is_active {
        return Err(SlotError::InactiveMeetingType(mt.id.value()));
    }
    if mt.duration_min == 0 {
        return Err(SlotError::InvalidDuration);
    }
    if query.granularity_min < MIN_GRANULARITY_MIN {
        return Err(SlotError::GranularityTooFine(query.granularity_min));
    }
    if query.from > query.to {
        return Err(SlotError::ReversedRange {
            from: query.from,
            to: query.to,
        });
    }
    let days = (query.to - query.from).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(SlotError::RangeTooWide { days });
    }

    let duration = mt.duration();
    let step = Duration::minutes(i64::from(query.granularity_min));

    // Buffers erode availability around existing bookings: a padded
    // existing range blocks any candidate it overlaps.
    let blocked: Vec<TimeRange> = query
        .bookings
        .iter()
        .filter(|b| b.blocks_time())
        .map(|b| b.range.padded(mt.buffer_before(), mt.buffer_after()))
        .collect();

    let mut starts: BTreeSet<DateTime<Utc>> = BTreeSet::new();
    let mut date = query.from;
    while date <= query.to {
        for window in query.windows {
            if !window.is_well_formed() {
                warn!(
                    meeting_type_id = window.meeting_type_id.value(),
                    start = %window.start,
                    end = %window.end,
                    "skipping malformed availability window"
                );
                continue;
            }
            if window.weekday != date.weekday() {
                continue;
            }
            let Some(open) = window_utc_range(window, date) else {
                continue;
            };

            let mut start = open.start;
            while start + duration <= open.end {
                let candidate = TimeRange::new(start, start + duration);
                if start >= query.now && !blocked.iter().any(|b| b.overlaps(&candidate)) {
                    starts.insert(start);
                }
                start += step;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(starts
        .into_iter()
        .map(|start| {
            let end = start + duration;
            CandidateSlot {
                range: TimeRange::new(start, end),
                start_local: start.with_timezone(&query.viewer_tz),
                end_local: end.with_timezone(&query.viewer_tz),
            }
        })
        .collect())
}

use crate::clock::{self, MINUTE};
use crate::limits::*;
use crate::model::*;

use super::BookingError;

/// Optional bounds on top of the ordering/status/overlap checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Opening hours `[open, close]` in minutes since reference-zone midnight.
    pub hours: Option<(u32, u32)>,
    /// Windows must start and last a whole number of slots.
    pub slot_step_minutes: Option<u32>,
    pub max_duration_ms: Option<Ms>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl BookingPolicy {
    pub const fn unrestricted() -> Self {
        Self {
            hours: None,
            slot_step_minutes: None,
            max_duration_ms: None,
        }
    }

    /// No hours or grid; windows capped at [`MAX_WINDOW_MS`].
    pub const fn capped() -> Self {
        Self {
            hours: None,
            slot_step_minutes: None,
            max_duration_ms: Some(MAX_WINDOW_MS),
        }
    }

    /// 09:00–18:00 on a 30-minute grid, at most two hours.
    pub const fn office_hours() -> Self {
        Self {
            hours: Some((9 * 60, 18 * 60)),
            slot_step_minutes: Some(30),
            max_duration_ms: Some(2 * clock::HOUR),
        }
    }

    /// The bookable part of the day starting at `day_start`.
    pub fn day_window(&self, day_start: Ms) -> Span {
        match self.hours {
            Some((open, close)) => Span::new(
                day_start + open as Ms * MINUTE,
                day_start + close as Ms * MINUTE,
            ),
            None => Span::new(day_start, day_start + clock::DAY),
        }
    }

    pub(crate) fn check(&self, span: &Span) -> Result<(), BookingError> {
        if let Some(max) = self.max_duration_ms
            && span.duration_ms() > max
        {
            return Err(BookingError::OutOfBounds("window longer than allowed duration"));
        }
        if self.hours.is_some() {
            let open = self.day_window(clock::day_start(span.start));
            if !open.contains_span(span) {
                return Err(BookingError::OutOfBounds("outside opening hours"));
            }
        }
        if let Some(step) = self.slot_step_minutes.filter(|s| *s > 0) {
            let step_ms = step as Ms * MINUTE;
            let offset = span.start - clock::day_start(span.start);
            if offset % step_ms != 0 || span.duration_ms() % step_ms != 0 {
                return Err(BookingError::OutOfBounds("not aligned to slot grid"));
            }
        }
        Ok(())
    }
}

/// Bookings on `room` whose window shares an instant with `span`.
/// Back-to-back windows do not overlap.
pub fn overlapping<'a, I>(bookings: I, room: &'a RoomId, span: Span) -> impl Iterator<Item = &'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
    I::IntoIter: 'a,
{
    bookings
        .into_iter()
        .filter(move |b| &b.room == room && b.span.overlaps(&span))
}

fn well_formed(field: &'static str, value: Option<Ms>) -> Result<Ms, BookingError> {
    match value {
        Some(t) if (MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&t) => Ok(t),
        _ => Err(BookingError::MissingField(field)),
    }
}

/// Decide whether `request` may be submitted. Pure; no I/O.
///
/// Checks short-circuit in this order: fields, ordering, room status,
/// policy bounds, overlap.
pub fn validate_with(
    policy: &BookingPolicy,
    request: &BookingRequest,
    existing: &[Booking],
    room_status: RoomStatus,
) -> Result<Span, BookingError> {
    let start = well_formed("startTime", request.start)?;
    let end = well_formed("endTime", request.end)?;
    let span = Span::try_new(start, end).ok_or(BookingError::InvalidOrder)?;

    if room_status != RoomStatus::Available {
        return Err(BookingError::RoomClosed(request.room.clone()));
    }

    policy.check(&span)?;

    let conflict = overlapping(existing, &request.room, span)
        .min_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.id.cmp(&b.id)));
    if let Some(b) = conflict {
        return Err(BookingError::Overlap(b.id.clone()));
    }
    Ok(span)
}

/// [`validate_with`] under the unrestricted policy.
pub fn validate(
    request: &BookingRequest,
    existing: &[Booking],
    room_status: RoomStatus,
) -> Result<(), BookingError> {
    validate_with(&BookingPolicy::unrestricted(), request, existing, room_status).map(|_| ())
}

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::model::*;

use super::validate::{overlapping, BookingPolicy};

/// What a room looks like to someone deciding whether to book it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveStatus {
    Available,
    Occupied,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupantInfo {
    pub booking_id: BookingId,
    pub user: UserRef,
    pub span: Span,
    pub remaining_ms: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub room_id: RoomId,
    pub name: String,
    pub admin_status: RoomStatus,
    pub status: EffectiveStatus,
    pub occupant: Option<OccupantInfo>,
    /// Start of the next booking that has not begun yet.
    pub next_start: Option<Ms>,
}

/// Derive per-room display state from raw rooms and bookings.
///
/// Output depends only on the arguments. More than one active booking on a
/// room is a data anomaly: the earliest-starting one wins and a warning is logged.
pub fn reconcile(rooms: &[Room], bookings: &[Booking], now: Ms) -> BTreeMap<RoomId, RoomView> {
    let mut by_room: HashMap<&RoomId, Vec<&Booking>> = HashMap::new();
    for b in bookings {
        by_room.entry(&b.room).or_default().push(b);
    }

    let instant = Span::new(now, now + 1);
    let mut views = BTreeMap::new();

    for room in rooms {
        let own: &[&Booking] = by_room.get(&room.id).map(Vec::as_slice).unwrap_or(&[]);

        let mut active: Vec<&Booking> = overlapping(own.iter().copied(), &room.id, instant).collect();
        active.sort_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.id.cmp(&b.id)));
        if active.len() > 1 {
            warn!(
                room = %room.id,
                count = active.len(),
                chosen = %active[0].id,
                "multiple active bookings on one room; using the earliest"
            );
            metrics::counter!(crate::observability::RECONCILE_ANOMALIES_TOTAL).increment(1);
        }
        let active = active.first().copied();

        let status = if room.status == RoomStatus::Unavailable {
            EffectiveStatus::Unavailable
        } else if active.is_some() {
            EffectiveStatus::Occupied
        } else {
            EffectiveStatus::Available
        };

        let occupant = active.map(|b| OccupantInfo {
            booking_id: b.id.clone(),
            user: b.user.clone(),
            span: b.span,
            remaining_ms: b.remaining_ms(now),
        });

        let next_start = own.iter().map(|b| b.span.start).filter(|s| *s > now).min();

        views.insert(
            room.id.clone(),
            RoomView {
                room_id: room.id.clone(),
                name: room.name.clone(),
                admin_status: room.status,
                status,
                occupant,
                next_start,
            },
        );
    }

    views
}

/// Free gaps on `room` during the bookable part of one reference-zone day.
pub fn free_windows(room: &Room, bookings: &[Booking], day_start: Ms, policy: &BookingPolicy) -> Vec<Span> {
    if room.status == RoomStatus::Unavailable {
        return Vec::new();
    }
    let window = policy.day_window(day_start);
    let mut taken: Vec<Span> = overlapping(bookings, &room.id, window)
        .map(|b| Span::new(b.span.start.max(window.start), b.span.end.min(window.end)))
        .collect();
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_intervals(&[window], &taken)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted and disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

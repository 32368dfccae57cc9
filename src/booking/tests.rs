use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::*;
use crate::clock::{at, HOUR, MINUTE};
use crate::model::*;

/// 2024-01-01 in the reference zone at `h:m`.
fn t(h: u32, m: u32) -> Ms {
    at(2024, 1, 1, h, m).unwrap()
}

fn room(id: &str, name: &str, status: RoomStatus) -> Room {
    Room {
        id: RoomId::from(id),
        name: name.to_string(),
        status,
        image: None,
    }
}

fn booking(id: &str, room: &str, start: Ms, end: Ms) -> Booking {
    Booking {
        id: BookingId::from(id),
        room: RoomId::from(room),
        user: UserRef {
            id: Some(UserId::from("u1")),
            student_id: Some("6401".into()),
            full_name: Some("Somchai".into()),
        },
        span: Span::new(start, end),
        created_at: None,
    }
}

fn request(room: &str, start: Ms, end: Ms) -> BookingRequest {
    BookingRequest::new(RoomId::from(room), start, end)
}

// ── Scenarios ────────────────────────────────────────────

#[test]
fn scenario_empty_room_accepts() {
    let req = request("co-working", t(9, 0), t(10, 0));
    assert_eq!(validate(&req, &[], RoomStatus::Available), Ok(()));
}

#[test]
fn scenario_overlap_rejected() {
    let existing = vec![booking("b1", "co-working", t(9, 0), t(10, 0))];
    let req = request("co-working", t(9, 30), t(10, 30));
    assert_eq!(
        validate(&req, &existing, RoomStatus::Available),
        Err(BookingError::Overlap(BookingId::from("b1")))
    );
}

#[test]
fn scenario_adjacent_accepted() {
    let existing = vec![booking("b1", "co-working", t(9, 0), t(10, 0))];
    let req = request("co-working", t(10, 0), t(11, 0));
    assert_eq!(validate(&req, &existing, RoomStatus::Available), Ok(()));
    // and the mirror image
    let req = request("co-working", t(8, 0), t(9, 0));
    assert_eq!(validate(&req, &existing, RoomStatus::Available), Ok(()));
}

#[test]
fn scenario_closed_room_rejected() {
    let req = request("os", t(9, 0), t(10, 0));
    assert_eq!(
        validate(&req, &[], RoomStatus::Unavailable),
        Err(BookingError::RoomClosed(RoomId::from("os")))
    );
}

#[test]
fn scenario_reversed_window_rejected() {
    let req = request("co-working", t(11, 0), t(10, 0));
    assert_eq!(
        validate(&req, &[], RoomStatus::Available),
        Err(BookingError::InvalidOrder)
    );
}

#[test]
fn scenario_sweep_past_booking() {
    let bookings = vec![booking("b1", "co-working", t(7, 0), t(8, 0))];
    assert_eq!(sweep(&bookings, t(9, 0)), vec![BookingId::from("b1")]);
}

// ── Validator edge cases ─────────────────────────────────

#[test]
fn zero_length_window_is_invalid_order() {
    let req = request("co-working", t(9, 0), t(9, 0));
    assert_eq!(
        validate(&req, &[], RoomStatus::Available),
        Err(BookingError::InvalidOrder)
    );
}

#[test]
fn missing_fields_checked_first() {
    let req = BookingRequest {
        room: RoomId::from("co-working"),
        start: None,
        end: None,
    };
    // closed room and missing fields: fields win
    assert_eq!(
        validate(&req, &[], RoomStatus::Unavailable),
        Err(BookingError::MissingField("startTime"))
    );
    let req = BookingRequest {
        room: RoomId::from("co-working"),
        start: Some(t(9, 0)),
        end: None,
    };
    assert_eq!(
        validate(&req, &[], RoomStatus::Available),
        Err(BookingError::MissingField("endTime"))
    );
}

#[test]
fn out_of_range_timestamp_is_malformed() {
    let req = BookingRequest {
        room: RoomId::from("co-working"),
        start: Some(-5),
        end: Some(t(9, 0)),
    };
    assert_eq!(
        validate(&req, &[], RoomStatus::Available),
        Err(BookingError::MissingField("startTime"))
    );
}

#[test]
fn order_checked_before_status() {
    let req = request("os", t(11, 0), t(10, 0));
    assert_eq!(
        validate(&req, &[], RoomStatus::Unavailable),
        Err(BookingError::InvalidOrder)
    );
}

#[test]
fn other_rooms_do_not_conflict() {
    let existing = vec![booking("b1", "dms", t(9, 0), t(10, 0))];
    let req = request("co-working", t(9, 0), t(10, 0));
    assert_eq!(validate(&req, &existing, RoomStatus::Available), Ok(()));
}

#[test]
fn overlap_names_earliest_conflict() {
    let existing = vec![
        booking("late", "co-working", t(10, 0), t(11, 0)),
        booking("early", "co-working", t(8, 0), t(9, 30)),
    ];
    let req = request("co-working", t(9, 0), t(10, 30));
    assert_eq!(
        validate(&req, &existing, RoomStatus::Available),
        Err(BookingError::Overlap(BookingId::from("early")))
    );
}

#[test]
fn enclosing_request_overlaps() {
    let existing = vec![booking("b1", "co-working", t(9, 30), t(9, 45))];
    let req = request("co-working", t(9, 0), t(10, 0));
    assert!(matches!(
        validate(&req, &existing, RoomStatus::Available),
        Err(BookingError::Overlap(_))
    ));
}

#[test]
fn policy_bounds_run_after_status_and_before_overlap() {
    let policy = BookingPolicy::office_hours();
    let existing = vec![booking("b1", "co-working", t(19, 0), t(20, 0))];
    let req = request("co-working", t(19, 0), t(20, 0));
    // closed room: status wins over bounds
    assert_eq!(
        validate_with(&policy, &req, &existing, RoomStatus::Unavailable),
        Err(BookingError::RoomClosed(RoomId::from("co-working")))
    );
    // open room: bounds win over overlap
    assert_eq!(
        validate_with(&policy, &req, &existing, RoomStatus::Available),
        Err(BookingError::OutOfBounds("outside opening hours"))
    );
}

#[test]
fn validate_with_returns_the_window() {
    let req = request("co-working", t(9, 0), t(10, 30));
    assert_eq!(
        validate_with(&BookingPolicy::office_hours(), &req, &[], RoomStatus::Available),
        Ok(Span::new(t(9, 0), t(10, 30)))
    );
}

// ── Reconciler ───────────────────────────────────────────

#[test]
fn reconcile_statuses() {
    let rooms = vec![
        room("r1", "CO-WORKING", RoomStatus::Available),
        room("r2", "Operating Systems", RoomStatus::Unavailable),
        room("r3", "Data Management Systems", RoomStatus::Available),
    ];
    let bookings = vec![
        booking("b1", "r1", t(9, 0), t(10, 0)),
        booking("b2", "r2", t(9, 0), t(10, 0)),
        booking("b3", "r3", t(11, 0), t(12, 0)),
    ];
    let views = reconcile(&rooms, &bookings, t(9, 15));

    let r1 = &views[&RoomId::from("r1")];
    assert_eq!(r1.status, EffectiveStatus::Occupied);
    let occ = r1.occupant.as_ref().unwrap();
    assert_eq!(occ.booking_id, BookingId::from("b1"));
    assert_eq!(occ.remaining_ms, 45 * MINUTE);
    assert_eq!(occ.user.display_name(), "Somchai");

    // admin override wins, occupant still reported
    let r2 = &views[&RoomId::from("r2")];
    assert_eq!(r2.status, EffectiveStatus::Unavailable);
    assert!(r2.occupant.is_some());

    let r3 = &views[&RoomId::from("r3")];
    assert_eq!(r3.status, EffectiveStatus::Available);
    assert!(r3.occupant.is_none());
    assert_eq!(r3.next_start, Some(t(11, 0)));
}

#[test]
fn reconcile_window_boundaries() {
    let rooms = vec![room("r1", "CO-WORKING", RoomStatus::Available)];
    let bookings = vec![booking("b1", "r1", t(9, 0), t(10, 0))];
    assert_eq!(
        reconcile(&rooms, &bookings, t(9, 0))[&RoomId::from("r1")].status,
        EffectiveStatus::Occupied
    );
    assert_eq!(
        reconcile(&rooms, &bookings, t(10, 0))[&RoomId::from("r1")].status,
        EffectiveStatus::Available
    );
}

#[test]
fn reconcile_double_booking_picks_earliest() {
    let rooms = vec![room("r1", "CO-WORKING", RoomStatus::Available)];
    let bookings = vec![
        booking("second", "r1", t(9, 30), t(11, 0)),
        booking("first", "r1", t(9, 0), t(10, 0)),
    ];
    let views = reconcile(&rooms, &bookings, t(9, 45));
    let occ = views[&RoomId::from("r1")].occupant.as_ref().unwrap();
    assert_eq!(occ.booking_id, BookingId::from("first"));
}

#[test]
fn reconcile_ignores_bookings_for_unknown_rooms() {
    let rooms = vec![room("r1", "CO-WORKING", RoomStatus::Available)];
    let bookings = vec![booking("b1", "ghost", t(9, 0), t(10, 0))];
    let views = reconcile(&rooms, &bookings, t(9, 30));
    assert_eq!(views.len(), 1);
    assert_eq!(views[&RoomId::from("r1")].status, EffectiveStatus::Available);
}

#[test]
fn reconcile_is_idempotent() {
    let rooms = vec![
        room("r1", "CO-WORKING", RoomStatus::Available),
        room("r2", "Operating Systems", RoomStatus::Unavailable),
    ];
    let bookings = vec![
        booking("b1", "r1", t(9, 0), t(10, 0)),
        booking("b2", "r1", t(10, 0), t(11, 0)),
    ];
    let a = reconcile(&rooms, &bookings, t(9, 59));
    let b = reconcile(&rooms, &bookings, t(9, 59));
    assert_eq!(a, b);
}

#[test]
fn free_windows_within_office_hours() {
    let r = room("r1", "CO-WORKING", RoomStatus::Available);
    let bookings = vec![
        booking("b1", "r1", t(8, 0), t(9, 30)),
        booking("b2", "r1", t(12, 0), t(13, 0)),
        booking("b3", "r1", t(12, 30), t(14, 0)),
        booking("other", "r2", t(10, 0), t(11, 0)),
    ];
    let free = free_windows(&r, &bookings, t(0, 0), &BookingPolicy::office_hours());
    assert_eq!(
        free,
        vec![Span::new(t(9, 30), t(12, 0)), Span::new(t(14, 0), t(18, 0))]
    );
}

#[test]
fn free_windows_closed_room_is_empty() {
    let r = room("r1", "Operating Systems", RoomStatus::Unavailable);
    assert!(free_windows(&r, &[], t(0, 0), &BookingPolicy::unrestricted()).is_empty());
}

#[test]
fn free_windows_unrestricted_covers_whole_day() {
    let r = room("r1", "CO-WORKING", RoomStatus::Available);
    let free = free_windows(&r, &[], t(0, 0), &BookingPolicy::unrestricted());
    assert_eq!(free, vec![Span::new(t(0, 0), t(0, 0) + 24 * HOUR)]);
}

// ── Properties ───────────────────────────────────────────

#[test]
fn accepted_bookings_never_overlap() {
    let mut rng = StdRng::seed_from_u64(7);
    let rooms = ["r1", "r2", "r3"];
    let mut accepted: Vec<Booking> = Vec::new();

    for i in 0..2000 {
        let room_id = *rooms.choose(&mut rng).unwrap();
        let start = t(0, 0) + rng.gen_range(0..48) * 30 * MINUTE;
        let len = rng.gen_range(0..6) * 30 * MINUTE; // may be zero
        let req = request(room_id, start, start + len);
        if validate(&req, &accepted, RoomStatus::Available).is_ok() {
            accepted.push(booking(&format!("b{i}"), room_id, start, start + len));
        }
    }

    assert!(!accepted.is_empty());
    for (i, a) in accepted.iter().enumerate() {
        for b in &accepted[i + 1..] {
            if a.room == b.room {
                assert!(!a.span.overlaps(&b.span), "{a:?} overlaps {b:?}");
            }
        }
    }
}

#[test]
fn reversed_or_empty_windows_never_ok() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let end = t(0, 0) + rng.gen_range(0..10_000) * MINUTE;
        let start = end + rng.gen_range(0..600) * MINUTE;
        let req = request("r1", start, end);
        assert_eq!(
            validate(&req, &[], RoomStatus::Available),
            Err(BookingError::InvalidOrder)
        );
    }
}

#[test]
fn closed_room_always_rejected_when_window_valid() {
    let mut rng = StdRng::seed_from_u64(13);
    let existing = vec![booking("b1", "r1", t(9, 0), t(10, 0))];
    for _ in 0..500 {
        let start = t(0, 0) + rng.gen_range(0..48) * 30 * MINUTE;
        let req = request("r1", start, start + rng.gen_range(1..=4) * 30 * MINUTE);
        assert_eq!(
            validate(&req, &existing, RoomStatus::Unavailable),
            Err(BookingError::RoomClosed(RoomId::from("r1")))
        );
    }
}

#[test]
fn sweep_partitions_by_end_time() {
    let mut rng = StdRng::seed_from_u64(17);
    let now = t(12, 0);
    let bookings: Vec<Booking> = (0..1000)
        .map(|i| {
            let start = t(0, 0) + rng.gen_range(0..24 * 60) * MINUTE;
            let end = start + rng.gen_range(1..=240) * MINUTE;
            booking(&format!("b{i}"), "r1", start, end)
        })
        .collect();

    let swept = sweep(&bookings, now);
    for b in &bookings {
        let hits = swept.iter().filter(|id| **id == b.id).count();
        if b.span.end <= now {
            assert_eq!(hits, 1, "expired {} must be swept once", b.id);
        } else {
            assert_eq!(hits, 0, "live {} must not be swept", b.id);
        }
    }
}

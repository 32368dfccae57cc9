use std::collections::HashSet;

use crate::model::*;

/// Ids of bookings whose window has ended (`end <= now`), each exactly once,
/// in input order.
pub fn sweep(bookings: &[Booking], now: Ms) -> Vec<BookingId> {
    let mut seen = HashSet::new();
    bookings
        .iter()
        .filter(|b| b.is_expired_at(now))
        .filter(|b| seen.insert(&b.id))
        .map(|b| b.id.clone())
        .collect()
}

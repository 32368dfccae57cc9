use crate::model::Ms;

/// Earliest accepted timestamp (Unix epoch).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// Latest accepted timestamp (9999-12-31T23:59:59.999Z).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;

/// Longest single booking window: 7 days.
pub const MAX_WINDOW_MS: Ms = 7 * 24 * 3_600_000;

/// Upper bound on concurrent DELETE calls issued by one sweep tick.
pub const MAX_CONCURRENT_SWEEP_DELETES: usize = 8;

/// Upper bound on bookings accepted from a single list response.
pub const MAX_BOOKINGS_PER_FETCH: usize = 100_000;

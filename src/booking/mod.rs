//! The booking-window core: validation, reconciliation and expiry selection.
//! Everything here is synchronous and free of I/O.

mod error;
mod reconcile;
mod sweep;
mod validate;
#[cfg(test)]
mod tests;

pub use error::BookingError;
pub use reconcile::{
    free_windows, merge_overlapping, reconcile, subtract_intervals, EffectiveStatus, OccupantInfo,
    RoomView,
};
pub use sweep::sweep;
pub use validate::{overlapping, validate, validate_with, BookingPolicy};

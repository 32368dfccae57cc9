use crate::model::{BookingId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// A required request field is absent or malformed.
    MissingField(&'static str),
    /// `start >= end`.
    InvalidOrder,
    RoomClosed(RoomId),
    /// Outside a policy bound (opening hours, slot grid, duration).
    OutOfBounds(&'static str),
    /// Conflicts with an existing booking on the same room.
    Overlap(BookingId),
    MissingAuth,
    NotPermitted(&'static str),
    /// An earlier optimistic update on the same entity has not settled.
    InFlight(String),
    NetworkFailure(String),
    NotFound(String),
    /// The server refused the request.
    Rejected { status: u16, message: String },
    /// The server answered with a body we could not decode.
    Protocol(String),
}

impl BookingError {
    /// Errors the sweeper may retry on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::NetworkFailure(_) | BookingError::Rejected { .. } | BookingError::Protocol(_)
        )
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::MissingField(field) => write!(f, "missing or malformed field: {field}"),
            BookingError::InvalidOrder => write!(f, "start time must be before end time"),
            BookingError::RoomClosed(id) => write!(f, "room {id} is closed for booking"),
            BookingError::OutOfBounds(msg) => write!(f, "out of bounds: {msg}"),
            BookingError::Overlap(id) => write!(f, "overlaps existing booking: {id}"),
            BookingError::MissingAuth => write!(f, "not logged in"),
            BookingError::NotPermitted(msg) => write!(f, "not permitted: {msg}"),
            BookingError::InFlight(id) => write!(f, "update already in flight for {id}"),
            BookingError::NetworkFailure(e) => write!(f, "network failure: {e}"),
            BookingError::NotFound(what) => write!(f, "not found: {what}"),
            BookingError::Rejected { status, message } => {
                write!(f, "rejected by server ({status}): {message}")
            }
            BookingError::Protocol(e) => write!(f, "unexpected response: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

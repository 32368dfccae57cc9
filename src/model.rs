use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Shared boundaries do not count: `[9, 10)` and `[10, 11)` are disjoint.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Server-issued room identifier.
    RoomId
);
string_id!(
    /// Server-issued booking identifier.
    BookingId
);
string_id!(
    /// Server-issued user identifier.
    UserId
);

/// Administrative override, independent of bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Unavailable,
}

impl RoomStatus {
    pub fn toggled(self) -> Self {
        match self {
            RoomStatus::Available => RoomStatus::Unavailable,
            RoomStatus::Unavailable => RoomStatus::Available,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub image: Option<String>,
}

/// Who made a booking. Every field is optional because list endpoints
/// return partially populated user documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRef {
    pub id: Option<UserId>,
    pub student_id: Option<String>,
    pub full_name: Option<String>,
}

impl UserRef {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.student_id.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub room: RoomId,
    pub user: UserRef,
    pub span: Span,
    pub created_at: Option<Ms>,
}

/// Client-side lifecycle of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPhase {
    /// Submitted, waiting for the API to confirm.
    Pending,
    /// Confirmed, window not yet started.
    Scheduled,
    /// Confirmed and `now` is inside the window.
    Active,
    /// `end <= now`, waiting for a sweep.
    Expired,
    /// Terminal; never stored.
    Cancelled,
}

impl Booking {
    pub fn is_active_at(&self, now: Ms) -> bool {
        self.span.contains_instant(now)
    }

    pub fn is_expired_at(&self, now: Ms) -> bool {
        self.span.end <= now
    }

    /// Phase of a confirmed booking. Pending/Cancelled are tracked outside the record.
    pub fn phase_at(&self, now: Ms) -> BookingPhase {
        if self.is_expired_at(now) {
            BookingPhase::Expired
        } else if self.is_active_at(now) {
            BookingPhase::Active
        } else {
            BookingPhase::Scheduled
        }
    }

    pub fn remaining_ms(&self, now: Ms) -> Ms {
        (self.span.end - now).max(0)
    }
}

/// A proposed booking. Timestamps that were absent or unparseable are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub room: RoomId,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

impl BookingRequest {
    pub fn new(room: RoomId, start: Ms, end: Ms) -> Self {
        Self {
            room,
            start: Some(start),
            end: Some(end),
        }
    }

    /// Build from raw form input; malformed timestamps become `None`.
    pub fn parse(room: RoomId, start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            room,
            start: start.and_then(clock::parse_timestamp),
            end: end.and_then(clock::parse_timestamp),
        }
    }
}

/// A submission awaiting API confirmation, keyed by a local id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBooking {
    pub local_id: Ulid,
    pub room: RoomId,
    pub span: Span,
    pub submitted_at: Ms,
}

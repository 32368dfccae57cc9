//! Transient copies of rooms and bookings.
//!
//! The cache has no authority: every mutation is confirmed by the API.
//! Optimistic changes are two-phase (`begin_*` then `commit_*` or
//! `rollback_*`), and a second optimistic change on the same entity is
//! refused until the first settles. Rollbacks apply to whatever the cache
//! holds at that moment, never to a snapshot taken when the request started.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::booking::BookingError;
use crate::model::*;
use crate::observability;

pub struct BookingCache {
    rooms: DashMap<RoomId, Room>,
    bookings: DashMap<BookingId, Booking>,
    /// Bookings removed locally while their DELETE is in flight.
    removing: DashMap<BookingId, Booking>,
    /// Pre-toggle status of rooms whose PATCH is in flight.
    toggling: DashMap<RoomId, RoomStatus>,
    pending: DashMap<Ulid, PendingBooking>,
    /// Bumped when a booking list fetch starts.
    epoch: AtomicU64,
    /// Epoch at which a booking was confirmed by a create.
    confirmed: DashMap<BookingId, u64>,
    /// Epoch at which a booking was confirmed gone.
    removed: DashMap<BookingId, u64>,
}

/// Taken before fetching a booking list and handed back with the result.
/// Changes the cache confirms after the mark survive a list fetched before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshMark(u64);

impl Default for BookingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingCache {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            bookings: DashMap::new(),
            removing: DashMap::new(),
            toggling: DashMap::new(),
            pending: DashMap::new(),
            epoch: AtomicU64::new(0),
            confirmed: DashMap::new(),
            removed: DashMap::new(),
        }
    }

    // ── Reads ────────────────────────────────────────────────

    /// Rooms ordered by name, then id.
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    /// Bookings ordered by start, then id.
    pub fn bookings(&self) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.id.cmp(&b.id)));
        bookings
    }

    pub fn room(&self, id: &RoomId) -> Option<Room> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_removing(&self, id: &BookingId) -> bool {
        self.removing.contains_key(id)
    }

    /// Map a booking's room reference to a room id: id match first, then name.
    /// Unknown references are returned unchanged.
    pub fn resolve_room(&self, reference: &RoomId) -> RoomId {
        if self.rooms.contains_key(reference) {
            return reference.clone();
        }
        let by_name = self
            .rooms
            .iter()
            .find(|e| e.value().name == reference.0)
            .map(|e| e.key().clone());
        match by_name {
            Some(id) => id,
            None => {
                debug!("unresolved room reference {reference}");
                reference.clone()
            }
        }
    }

    // ── Bulk replacement (refetch) ───────────────────────────

    /// Replace the room list. Rooms with a toggle in flight keep their optimistic status.
    pub fn replace_rooms(&self, fresh: Vec<Room>) {
        let mut next: Vec<Room> = Vec::with_capacity(fresh.len());
        for mut room in fresh {
            if self.toggling.contains_key(&room.id)
                && let Some(current) = self.rooms.get(&room.id)
            {
                room.status = current.status;
            }
            next.push(room);
        }
        self.rooms.retain(|id, _| next.iter().any(|r| &r.id == id));
        for room in next {
            self.rooms.insert(room.id.clone(), room);
        }
        metrics::gauge!(observability::ROOMS_CACHED).set(self.rooms.len() as f64);
    }

    pub fn begin_refresh(&self) -> RefreshMark {
        RefreshMark(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn stamp(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Replace the booking list with one fetched after `mark`.
    ///
    /// Bookings whose removal is in flight, or confirmed gone since `mark`,
    /// stay removed. Bookings created since `mark` are kept even when the
    /// list predates them.
    pub fn replace_bookings(&self, mark: RefreshMark, fresh: Vec<Booking>) {
        let RefreshMark(since) = mark;
        let mut next: Vec<Booking> = Vec::with_capacity(fresh.len());
        let mut unresolved = 0usize;
        for mut booking in fresh {
            if self.removing.contains_key(&booking.id)
                || self.removed.get(&booking.id).is_some_and(|e| *e.value() >= since)
            {
                continue;
            }
            booking.room = self.resolve_room(&booking.room);
            if !self.rooms.contains_key(&booking.room) {
                unresolved += 1;
            }
            next.push(booking);
        }
        if unresolved > 0 {
            warn!("{unresolved} bookings reference rooms that are not in the room list");
        }
        let kept: Vec<Booking> = self
            .confirmed
            .iter()
            .filter(|e| *e.value() >= since && !next.iter().any(|b| &b.id == e.key()))
            .filter_map(|e| self.bookings.get(e.key()).map(|b| b.value().clone()))
            .collect();
        self.bookings.clear();
        for booking in next.into_iter().chain(kept) {
            self.bookings.insert(booking.id.clone(), booking);
        }
        self.confirmed.retain(|_, at| *at >= since);
        self.removed.retain(|_, at| *at >= since);
        metrics::gauge!(observability::BOOKINGS_CACHED).set(self.bookings.len() as f64);
    }

    /// Insert an API-confirmed booking, resolving its room reference.
    pub fn insert_booking(&self, mut booking: Booking) -> Booking {
        booking.room = self.resolve_room(&booking.room);
        self.confirmed.insert(booking.id.clone(), self.stamp());
        self.bookings.insert(booking.id.clone(), booking.clone());
        metrics::gauge!(observability::BOOKINGS_CACHED).set(self.bookings.len() as f64);
        booking
    }

    /// Drop a booking the API has confirmed gone, including any in-flight removal
    /// so a later rollback cannot resurrect it.
    pub fn forget(&self, id: &BookingId) -> bool {
        let a = self.bookings.remove(id).is_some();
        let b = self.removing.remove(id).is_some();
        self.confirmed.remove(id);
        self.removed.insert(id.clone(), self.stamp());
        metrics::gauge!(observability::BOOKINGS_CACHED).set(self.bookings.len() as f64);
        a || b
    }

    // ── Optimistic removal ───────────────────────────────────

    pub fn begin_removal(&self, id: &BookingId) -> Result<Booking, BookingError> {
        if self.removing.contains_key(id) {
            return Err(BookingError::InFlight(id.to_string()));
        }
        let (_, booking) = self
            .bookings
            .remove(id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
        self.removing.insert(id.clone(), booking.clone());
        Ok(booking)
    }

    pub fn commit_removal(&self, id: &BookingId) {
        self.removing.remove(id);
        self.confirmed.remove(id);
        self.removed.insert(id.clone(), self.stamp());
        metrics::gauge!(observability::BOOKINGS_CACHED).set(self.bookings.len() as f64);
    }

    /// Put the booking back unless something else already settled it.
    pub fn rollback_removal(&self, id: &BookingId) -> bool {
        match self.removing.remove(id) {
            Some((_, booking)) => {
                self.bookings.insert(id.clone(), booking);
                true
            }
            None => false,
        }
    }

    // ── Optimistic room toggle ───────────────────────────────

    /// Flip the cached status; returns `(previous, next)`.
    pub fn begin_toggle(&self, id: &RoomId) -> Result<(RoomStatus, RoomStatus), BookingError> {
        if self.toggling.contains_key(id) {
            return Err(BookingError::InFlight(id.to_string()));
        }
        let (prev, next) = {
            let mut room = self
                .rooms
                .get_mut(id)
                .ok_or_else(|| BookingError::NotFound(format!("room {id}")))?;
            let prev = room.status;
            room.status = prev.toggled();
            (prev, room.status)
        };
        self.toggling.insert(id.clone(), prev);
        Ok((prev, next))
    }

    pub fn commit_toggle(&self, confirmed: Room) {
        self.toggling.remove(&confirmed.id);
        self.rooms.insert(confirmed.id.clone(), confirmed);
    }

    pub fn rollback_toggle(&self, id: &RoomId) -> bool {
        match self.toggling.remove(id) {
            Some((_, prev)) => {
                if let Some(mut room) = self.rooms.get_mut(id) {
                    room.status = prev;
                }
                true
            }
            None => false,
        }
    }

    // ── Pending submissions ──────────────────────────────────

    pub fn add_pending(&self, room: RoomId, span: Span, now: Ms) -> Ulid {
        let local_id = Ulid::new();
        self.pending.insert(
            local_id,
            PendingBooking {
                local_id,
                room,
                span,
                submitted_at: now,
            },
        );
        local_id
    }

    pub fn resolve_pending(&self, local_id: &Ulid) -> Option<PendingBooking> {
        self.pending.remove(local_id).map(|(_, p)| p)
    }

    pub fn pending(&self) -> Vec<PendingBooking> {
        let mut pending: Vec<PendingBooking> = self.pending.iter().map(|e| e.value().clone()).collect();
        pending.sort_by_key(|p| p.local_id);
        pending
    }

    /// A pending submission on `room` that shares an instant with `span`.
    pub fn pending_overlap(&self, room: &RoomId, span: &Span) -> Option<Ulid> {
        self.pending
            .iter()
            .find(|e| &e.value().room == room && e.value().span.overlaps(span))
            .map(|e| *e.key())
    }
}

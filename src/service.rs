//! I/O wrappers around the booking core: local checks first, then the API,
//! then the cache.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::api::RoomApi;
use crate::booking::{self, BookingError, BookingPolicy, RoomView};
use crate::cache::BookingCache;
use crate::clock;
use crate::limits::MAX_CONCURRENT_SWEEP_DELETES;
use crate::model::*;
use crate::observability;
use crate::session::{self, SessionContext};

/// Outcome of one sweep tick. Each candidate lands in exactly one list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub cancelled: Vec<BookingId>,
    /// The server no longer had them; counted as success.
    pub already_gone: Vec<BookingId>,
    /// Left in the cache; retried next tick.
    pub failed: Vec<(BookingId, BookingError)>,
    /// Owned by someone else, or a manual cancel is already in flight.
    pub skipped: Vec<BookingId>,
}

impl SweepReport {
    pub fn candidates(&self) -> usize {
        self.cancelled.len() + self.already_gone.len() + self.failed.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates() == 0
    }
}

pub struct BookingService {
    api: Arc<dyn RoomApi>,
    session: SessionContext,
    cache: BookingCache,
    policy: BookingPolicy,
    timeout: Duration,
}

impl BookingService {
    pub fn new(api: Arc<dyn RoomApi>, session: SessionContext, policy: BookingPolicy, timeout: Duration) -> Self {
        Self {
            api,
            session,
            cache: BookingCache::new(),
            policy,
            timeout,
        }
    }

    pub fn cache(&self) -> &BookingCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Bound a network call. A timeout is reported, never retried here.
    async fn call<T>(&self, fut: impl Future<Output = Result<T, BookingError>>) -> Result<T, BookingError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BookingError::NetworkFailure(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Refetch rooms, then bookings (so room references resolve against the fresh list).
    pub async fn refresh(&self) -> Result<(), BookingError> {
        let session = self.session.require()?;
        let rooms = self.call(self.api.list_rooms(&session.token)).await?;
        self.cache.replace_rooms(rooms);
        let mark = self.cache.begin_refresh();
        let bookings = self.call(self.api.list_bookings(&session.token)).await?;
        self.cache.replace_bookings(mark, bookings);
        debug!(
            rooms = self.cache.room_count(),
            bookings = self.cache.booking_count(),
            "cache refreshed"
        );
        Ok(())
    }

    /// Check a request locally and, if it passes, create it remotely.
    /// Local failures return before any network call.
    pub async fn submit(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let session = self.session.require()?;
        if !session::can_book(session.role) {
            return Err(BookingError::NotPermitted("guests cannot book"));
        }
        let room_id = self.cache.resolve_room(&request.room);
        let room = self
            .cache
            .room(&room_id)
            .ok_or_else(|| BookingError::NotFound(format!("room {}", request.room)))?;
        let request = BookingRequest {
            room: room.id.clone(),
            ..request
        };

        let existing = self.cache.bookings();
        let span = booking::validate_with(&self.policy, &request, &existing, room.status)
            .inspect_err(|e| {
                metrics::counter!(observability::VALIDATION_REJECTIONS_TOTAL, "kind" => observability::error_label(e))
                    .increment(1);
            })?;
        if self.cache.pending_overlap(&room.id, &span).is_some() {
            return Err(BookingError::InFlight(room.id.to_string()));
        }

        let local_id = self.cache.add_pending(room.id.clone(), span, clock::now_ms());
        let result = self.call(self.api.create_booking(&session.token, &room, span)).await;
        self.cache.resolve_pending(&local_id);

        let booking = self.cache.insert_booking(result?);
        info!(
            booking = %booking.id,
            room = %room.name,
            "booked {} – {}",
            clock::to_local_string(booking.span.start),
            clock::to_local_string(booking.span.end)
        );
        Ok(booking)
    }

    /// Cancel one booking: optimistic local removal, rolled back if the API refuses.
    /// A booking the server no longer has counts as cancelled.
    pub async fn cancel(&self, id: &BookingId) -> Result<(), BookingError> {
        let session = self.session.require()?;
        if self.cache.is_removing(id) {
            return Err(BookingError::InFlight(id.to_string()));
        }
        let target = self
            .cache
            .booking(id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
        if !session::can_cancel(session.role, &target, session.actor.as_ref()) {
            return Err(BookingError::NotPermitted("only the owner or an admin may cancel"));
        }

        self.cache.begin_removal(id)?;
        match self.call(self.api.cancel_booking(&session.token, id)).await {
            Ok(()) | Err(BookingError::NotFound(_)) => {
                self.cache.commit_removal(id);
                info!(booking = %id, "booking cancelled");
                Ok(())
            }
            Err(e) => {
                if self.cache.rollback_removal(id) {
                    metrics::counter!(observability::ROLLBACKS_TOTAL, "entity" => "booking").increment(1);
                }
                warn!(booking = %id, "cancel failed, restored locally: {e}");
                Err(e)
            }
        }
    }

    /// Flip a room between available and unavailable (admin only).
    pub async fn toggle_room(&self, id: &RoomId) -> Result<Room, BookingError> {
        let session = self.session.require()?;
        if !session::can_toggle_room(session.role) {
            return Err(BookingError::NotPermitted("only admins may open or close rooms"));
        }
        let (_, next) = self.cache.begin_toggle(id)?;
        match self.call(self.api.set_room_status(&session.token, id, next)).await {
            Ok(room) => {
                self.cache.commit_toggle(room.clone());
                info!(room = %id, status = room.status.as_str(), "room status changed");
                Ok(room)
            }
            Err(e) => {
                if self.cache.rollback_toggle(id) {
                    metrics::counter!(observability::ROLLBACKS_TOTAL, "entity" => "room").increment(1);
                }
                warn!(room = %id, "status change failed, restored locally: {e}");
                Err(e)
            }
        }
    }

    /// Fetch one booking from the server, joined to a cached room when possible.
    pub async fn booking(&self, id: &BookingId) -> Result<Booking, BookingError> {
        let session = self.session.require()?;
        let mut booking = self.call(self.api.booking(&session.token, id)).await?;
        booking.room = self.cache.resolve_room(&booking.room);
        Ok(booking)
    }

    /// Per-room display state from the current cache.
    pub fn views(&self, now: Ms) -> BTreeMap<RoomId, RoomView> {
        booking::reconcile(&self.cache.rooms(), &self.cache.bookings(), now)
    }

    /// Open gaps on a room for the reference-zone day containing `day`.
    pub fn free_windows(&self, room: &RoomId, day: Ms) -> Result<Vec<Span>, BookingError> {
        let room = self
            .cache
            .room(&self.cache.resolve_room(room))
            .ok_or_else(|| BookingError::NotFound(format!("room {room}")))?;
        Ok(booking::free_windows(
            &room,
            &self.cache.bookings(),
            clock::day_start(day),
            &self.policy,
        ))
    }

    /// One sweep: select expired bookings from a fresh snapshot and delete them,
    /// each independently. Failures stay cached and come back next tick.
    pub async fn sweep_once(&self, now: Ms) -> Result<SweepReport, BookingError> {
        let session = self.session.require()?;
        let snapshot = self.cache.bookings();
        let expired = booking::sweep(&snapshot, now);
        let mut report = SweepReport::default();
        if expired.is_empty() {
            return Ok(report);
        }
        metrics::counter!(observability::SWEEP_CANDIDATES_TOTAL).increment(expired.len() as u64);

        let mut targets = Vec::with_capacity(expired.len());
        for id in expired {
            let owned = snapshot
                .iter()
                .find(|b| b.id == id)
                .is_some_and(|b| session::can_sweep(session.role, b, session.actor.as_ref()));
            if !owned || self.cache.is_removing(&id) {
                debug!(booking = %id, "sweep skip");
                report.skipped.push(id);
            } else {
                targets.push(id);
            }
        }

        let token = session.token.as_str();
        let calls: Vec<_> = targets
            .into_iter()
            .map(|id| async move {
                let result = self.call(self.api.cancel_booking(token, &id)).await;
                (id, result)
            })
            .collect();
        let outcomes: Vec<(BookingId, Result<(), BookingError>)> = stream::iter(calls)
            .buffer_unordered(MAX_CONCURRENT_SWEEP_DELETES)
            .collect()
            .await;

        for (id, result) in outcomes {
            match result {
                Ok(()) => {
                    self.cache.forget(&id);
                    report.cancelled.push(id);
                }
                Err(BookingError::NotFound(_)) => {
                    self.cache.forget(&id);
                    report.already_gone.push(id);
                }
                Err(e) => {
                    warn!(booking = %id, "sweep delete failed, will retry: {e}");
                    report.failed.push((id, e));
                }
            }
        }

        let removed = (report.cancelled.len() + report.already_gone.len()) as u64;
        metrics::counter!(observability::SWEEP_CANCELLED_TOTAL).increment(removed);
        metrics::counter!(observability::SWEEP_FAILURES_TOTAL).increment(report.failed.len() as u64);
        Ok(report)
    }
}

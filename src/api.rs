//! The HTTP seam. [`RoomApi`] is everything the booking core needs from the
//! remote service; [`HttpApi`] implements it over reqwest.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::booking::BookingError;
use crate::clock;
use crate::limits::MAX_BOOKINGS_PER_FETCH;
use crate::model::*;
use crate::observability;
use crate::session::{Role, Session};
use crate::wire::*;

#[async_trait]
pub trait RoomApi: Send + Sync {
    /// `GET /admin/rooms`
    async fn list_rooms(&self, token: &str) -> Result<Vec<Room>, BookingError>;
    /// `GET /bookings`; the caller's own or everyone's depending on role.
    async fn list_bookings(&self, token: &str) -> Result<Vec<Booking>, BookingError>;

    /// `GET /bookings/{id}`
    async fn booking(&self, token: &str, id: &BookingId) -> Result<Booking, BookingError>;
    /// `POST /bookings`
    async fn create_booking(&self, token: &str, room: &Room, span: Span) -> Result<Booking, BookingError>;
    /// `DELETE /bookings/{id}`
    async fn cancel_booking(&self, token: &str, id: &BookingId) -> Result<(), BookingError>;
    /// `PATCH /admin/rooms/{id}`
    async fn set_room_status(&self, token: &str, id: &RoomId, status: RoomStatus) -> Result<Room, BookingError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Session, BookingError>;
    async fn register(&self, registration: &Registration) -> Result<Option<String>, BookingError>;
    async fn profile(&self, token: &str) -> Result<Profile, BookingError>;
    async fn update_profile(&self, token: &str, profile: &Profile) -> Result<Profile, BookingError>;
}

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BookingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BookingError::NetworkFailure(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send, record metrics, and turn non-2xx statuses into errors.
    async fn execute(&self, op: &'static str, builder: RequestBuilder) -> Result<Response, BookingError> {
        let started = Instant::now();
        let result = match builder.send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp),
            Ok(resp) => Err(error_from_response(resp).await),
            Err(e) => Err(transport_error(&e)),
        };
        metrics::histogram!(observability::API_REQUEST_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => observability::error_label(e),
        };
        metrics::counter!(observability::API_REQUESTS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
        result
    }

    async fn fetch<R: DeserializeOwned>(&self, op: &'static str, builder: RequestBuilder) -> Result<R, BookingError> {
        let resp = self.execute(op, builder).await?;
        resp.json::<R>()
            .await
            .map_err(|e| BookingError::Protocol(format!("{op}: {e}")))
    }
}

fn transport_error(e: &reqwest::Error) -> BookingError {
    if e.is_timeout() {
        BookingError::NetworkFailure("request timed out".into())
    } else {
        BookingError::NetworkFailure(e.to_string())
    }
}

async fn error_from_response(resp: Response) -> BookingError {
    let status = resp.status();
    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    match status {
        StatusCode::NOT_FOUND => BookingError::NotFound(message),
        StatusCode::UNAUTHORIZED => BookingError::MissingAuth,
        _ => BookingError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RoomApi for HttpApi {
    async fn list_rooms(&self, token: &str) -> Result<Vec<Room>, BookingError> {
        let req = self.client.get(self.url("/admin/rooms")).bearer_auth(token);
        let rooms: Vec<RoomDto> = self.fetch("list_rooms", req).await?;
        Ok(rooms.into_iter().map(Room::from).collect())
    }

    async fn list_bookings(&self, token: &str) -> Result<Vec<Booking>, BookingError> {
        let req = self.client.get(self.url("/bookings")).bearer_auth(token);
        let dtos: Vec<BookingDto> = self.fetch("list_bookings", req).await?;
        // a partial list would hide bookings from the overlap and expiry checks
        if dtos.len() > MAX_BOOKINGS_PER_FETCH {
            return Err(BookingError::Protocol(format!(
                "booking list has {} entries, limit is {MAX_BOOKINGS_PER_FETCH}",
                dtos.len()
            )));
        }
        let mut bookings = Vec::with_capacity(dtos.len());
        for dto in dtos {
            match Booking::try_from(dto) {
                Ok(b) => bookings.push(b),
                Err(e) => warn!("skipping booking record: {e}"),
            }
        }
        Ok(bookings)
    }

    async fn booking(&self, token: &str, id: &BookingId) -> Result<Booking, BookingError> {
        let req = self
            .client
            .get(self.url(&format!("/bookings/{id}")))
            .bearer_auth(token);
        let dto: BookingDto = self.fetch("get_booking", req).await?;
        Booking::try_from(dto)
    }

    async fn create_booking(&self, token: &str, room: &Room, span: Span) -> Result<Booking, BookingError> {
        let start_time = clock::to_iso(span.start).ok_or(BookingError::MissingField("startTime"))?;
        let end_time = clock::to_iso(span.end).ok_or(BookingError::MissingField("endTime"))?;
        let body = CreateBookingBody {
            room: room.name.clone(),
            start_time,
            end_time,
        };
        let req = self.client.post(self.url("/bookings")).bearer_auth(token).json(&body);
        let resp: CreateBookingResponse = self.fetch("create_booking", req).await?;
        Booking::try_from(resp.booking)
    }

    async fn cancel_booking(&self, token: &str, id: &BookingId) -> Result<(), BookingError> {
        let req = self
            .client
            .delete(self.url(&format!("/bookings/{id}")))
            .bearer_auth(token);
        self.execute("cancel_booking", req).await.map(|_| ())
    }

    async fn set_room_status(&self, token: &str, id: &RoomId, status: RoomStatus) -> Result<Room, BookingError> {
        let req = self
            .client
            .patch(self.url(&format!("/admin/rooms/{id}")))
            .bearer_auth(token)
            .json(&StatusBody { status });
        let room: RoomDto = self.fetch("set_room_status", req).await?;
        Ok(room.into())
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<Session, BookingError> {
        let req = self.client.post(self.url("/login")).json(credentials);
        let resp: LoginResponse = self.fetch("login", req).await?;
        Ok(Session {
            token: resp.token,
            role: resp.role.unwrap_or(Role::User),
            actor: resp.user.and_then(|u| u.id).map(UserId),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<Option<String>, BookingError> {
        let req = self.client.post(self.url("/register")).json(registration);
        let resp: MessageResponse = self.fetch("register", req).await?;
        Ok(resp.message)
    }

    async fn profile(&self, token: &str) -> Result<Profile, BookingError> {
        let req = self.client.get(self.url("/profile")).bearer_auth(token);
        self.fetch("profile", req).await
    }

    async fn update_profile(&self, token: &str, profile: &Profile) -> Result<Profile, BookingError> {
        let req = self
            .client
            .put(self.url("/profile"))
            .bearer_auth(token)
            .json(profile);
        let resp: ProfileUpdateResponse = self.fetch("update_profile", req).await?;
        Ok(resp.into_profile())
    }
}

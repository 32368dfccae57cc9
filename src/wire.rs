//! JSON shapes of the booking REST API and their conversion into [`crate::model`].

use serde::{Deserialize, Serialize};

use crate::booking::BookingError;
use crate::clock;
use crate::model::*;
use crate::session::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<RoomDto> for Room {
    fn from(dto: RoomDto) -> Self {
        Room {
            id: RoomId(dto.id),
            name: dto.name,
            status: dto.status,
            image: dto.image,
        }
    }
}

/// `booking.room` is a plain name in most responses and a populated
/// document in some.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomRefDto {
    Plain(String),
    Populated {
        #[serde(rename = "_id", alias = "id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl RoomRefDto {
    /// The raw reference; resolved against known rooms by the cache.
    pub fn into_key(self) -> RoomId {
        match self {
            RoomRefDto::Plain(s) => RoomId(s),
            RoomRefDto::Populated { id, .. } => RoomId(id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl From<UserDto> for UserRef {
    fn from(dto: UserDto) -> Self {
        UserRef {
            id: dto.id.map(UserId),
            student_id: dto.student_id,
            full_name: dto.full_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub room: RoomRefDto,
    #[serde(default)]
    pub user: Option<UserDto>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TryFrom<BookingDto> for Booking {
    type Error = BookingError;

    fn try_from(dto: BookingDto) -> Result<Self, Self::Error> {
        let start = clock::parse_timestamp(&dto.start_time)
            .ok_or_else(|| BookingError::Protocol(format!("booking {}: bad startTime", dto.id)))?;
        let end = clock::parse_timestamp(&dto.end_time)
            .ok_or_else(|| BookingError::Protocol(format!("booking {}: bad endTime", dto.id)))?;
        let span = Span::try_new(start, end)
            .ok_or_else(|| BookingError::Protocol(format!("booking {}: empty window", dto.id)))?;
        Ok(Booking {
            id: BookingId(dto.id),
            room: dto.room.into_key(),
            user: dto.user.map(UserRef::from).unwrap_or_default(),
            span,
            created_at: dto.created_at.as_deref().and_then(clock::parse_timestamp),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    pub room: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub booking: BookingDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: RoomStatus,
}

/// Error bodies use either `message` or `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub student_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub student_id: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub user: Option<UserDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// `PUT /profile` answers with the profile itself or wrapped with a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileUpdateResponse {
    Wrapped {
        #[serde(default)]
        message: Option<String>,
        user: Profile,
    },
    Plain(Profile),
}

impl ProfileUpdateResponse {
    pub fn into_profile(self) -> Profile {
        match self {
            ProfileUpdateResponse::Wrapped { user, .. } => user,
            ProfileUpdateResponse::Plain(profile) => profile,
        }
    }
}

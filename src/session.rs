//! Authentication state and role capabilities.
//!
//! The session is held in one `SessionContext` handed to whoever needs auth;
//! there is no ambient global token.

use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::booking::BookingError;
use crate::model::{Booking, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    #[default]
    Guest,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    /// Id of the logged-in user; needed to cancel one's own bookings.
    #[serde(default)]
    pub actor: Option<UserId>,
}

impl Session {
    fn has_token(&self) -> bool {
        let t = self.token.trim();
        !t.is_empty() && t != "undefined" && t != "null"
    }
}

/// Shared, observable login state.
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { state: Arc::new(tx) }
    }

    pub fn with_session(session: Session) -> Self {
        let ctx = Self::new();
        ctx.login(session);
        ctx
    }

    /// Replace the current session. A blank token is the same as logging out.
    pub fn login(&self, session: Session) {
        let next = session.has_token().then_some(session);
        self.state.send_replace(next);
    }

    pub fn logout(&self) -> Option<Session> {
        self.state.send_replace(None)
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn role(&self) -> Role {
        self.state.borrow().as_ref().map_or(Role::Guest, |s| s.role)
    }

    /// The current session, or `MissingAuth`.
    pub fn require(&self) -> Result<Session, BookingError> {
        self.current().ok_or(BookingError::MissingAuth)
    }

    /// Watch login/logout transitions.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Read a session persisted by [`SessionContext::save`]. Missing file is `Ok(None)`.
    pub fn load(path: &Path) -> io::Result<Option<Session>> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the current session (or remove the file when logged out).
    /// Writes a temp file and renames it into place.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let Some(session) = self.current() else {
            return match std::fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        };
        let bytes = serde_json::to_vec_pretty(&session)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        write_private(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)
    }
}

/// Write a file only the owner can read; it holds a bearer token.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    use std::io::Write;

    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ── Capabilities ─────────────────────────────────────────────────

pub fn can_book(role: Role) -> bool {
    matches!(role, Role::Admin | Role::User)
}

/// Admins cancel anything; users only bookings they own.
pub fn can_cancel(role: Role, booking: &Booking, actor: Option<&UserId>) -> bool {
    match role {
        Role::Admin => true,
        Role::User => actor.is_some() && booking.user.id.as_ref() == actor,
        Role::Guest => false,
    }
}

/// Whether a sweep may delete `booking`. A user's booking list is already
/// scoped to that user, so an unknown owner or actor does not block it;
/// only a known mismatch does.
pub fn can_sweep(role: Role, booking: &Booking, actor: Option<&UserId>) -> bool {
    match role {
        Role::Admin => true,
        Role::User => match (booking.user.id.as_ref(), actor) {
            (Some(owner), Some(me)) => owner == me,
            _ => true,
        },
        Role::Guest => false,
    }
}

pub fn can_toggle_room(role: Role) -> bool {
    role == Role::Admin
}

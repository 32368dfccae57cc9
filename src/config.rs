//! Runtime settings from `ROOMKEEPER_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::booking::BookingPolicy;
use crate::clock::MINUTE;
use crate::limits::MAX_WINDOW_MS;
use crate::model::Ms;
use crate::session::Role;
use crate::wire::Credentials;

pub const DEFAULT_API_URL: &str = "http://localhost:4999/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub role: Role,
    pub user_id: Option<String>,
    /// Log in with these when no token is configured or persisted.
    pub credentials: Option<Credentials>,
    pub session_file: Option<PathBuf>,
    pub timeout: Duration,
    pub sweep_interval: Duration,
    pub refresh_interval: Duration,
    pub policy: BookingPolicy,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let num = |key: &str, default: u64| -> u64 {
            get(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
        };

        let credentials = match (get("ROOMKEEPER_STUDENT_ID"), get("ROOMKEEPER_PASSWORD")) {
            (Some(student_id), Some(password)) if !student_id.is_empty() => Some(Credentials {
                student_id,
                password,
            }),
            _ => None,
        };

        let open: Option<u32> = get("ROOMKEEPER_OPEN_HOUR").map_or(Some(9), |s| s.trim().parse().ok());
        let close: Option<u32> = get("ROOMKEEPER_CLOSE_HOUR").map_or(Some(18), |s| s.trim().parse().ok());
        let hours = match (open, close) {
            (Some(open), Some(close)) if open < close && close <= 24 => Some((open * 60, close * 60)),
            _ => None,
        };
        let slot = u32::try_from(num("ROOMKEEPER_SLOT_MINUTES", 30)).unwrap_or(30);
        let max_minutes = num("ROOMKEEPER_MAX_DURATION_MINUTES", 120);
        let max_duration_ms = Ms::try_from(max_minutes)
            .ok()
            .and_then(|m| m.checked_mul(MINUTE))
            .map_or(MAX_WINDOW_MS, |ms| ms.min(MAX_WINDOW_MS));
        let policy = BookingPolicy {
            hours,
            slot_step_minutes: (slot > 0).then_some(slot),
            max_duration_ms: Some(max_duration_ms),
        };

        Self {
            api_url: get("ROOMKEEPER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            token: get("ROOMKEEPER_TOKEN").filter(|t| !t.trim().is_empty()),
            role: get("ROOMKEEPER_ROLE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(Role::User),
            user_id: get("ROOMKEEPER_USER_ID").filter(|s| !s.is_empty()),
            credentials,
            session_file: get("ROOMKEEPER_SESSION_FILE").map(PathBuf::from),
            timeout: Duration::from_millis(num("ROOMKEEPER_TIMEOUT_MS", 10_000)),
            sweep_interval: Duration::from_secs(num("ROOMKEEPER_SWEEP_INTERVAL_SECS", 30).max(1)),
            refresh_interval: Duration::from_secs(num("ROOMKEEPER_REFRESH_INTERVAL_SECS", 60).max(1)),
            policy,
            metrics_port: get("ROOMKEEPER_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        }
    }
}

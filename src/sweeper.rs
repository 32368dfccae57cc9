use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::booking::BookingError;
use crate::clock;
use crate::service::BookingService;

/// Background task that periodically deletes expired bookings.
///
/// Every tick reads a fresh snapshot; a slow tick delays the next one
/// instead of overlapping it. Stops when `cancel` fires.
pub async fn run_sweeper(service: Arc<BookingService>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match service.sweep_once(clock::now_ms()).await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => info!(
                cancelled = report.cancelled.len(),
                already_gone = report.already_gone.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                "sweep finished"
            ),
            Err(BookingError::MissingAuth) => debug!("sweep skipped: not logged in"),
            Err(e) => warn!("sweep failed: {e}"),
        }
    }
    debug!("sweeper stopped");
}

/// Background task that periodically refetches rooms and bookings.
pub async fn run_refresher(service: Arc<BookingService>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; startup already refreshed
    interval.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match service.refresh().await {
            Ok(()) => {}
            Err(BookingError::MissingAuth) => debug!("refresh skipped: not logged in"),
            Err(e) => warn!("refresh failed: {e}"),
        }
    }
    debug!("refresher stopped");
}

/// Owns the sweeper and refresher tasks for one service.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn spawn(service: Arc<BookingService>, sweep_every: Duration, refresh_every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handles = vec![
            tokio::spawn(run_sweeper(service.clone(), sweep_every, cancel.clone())),
            tokio::spawn(run_refresher(service, refresh_every, cancel.clone())),
        ];
        Self { cancel, handles }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop both loops and wait for them. An in-flight tick finishes first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("background task ended abnormally: {e}");
            }
        }
    }
}

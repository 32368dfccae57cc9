use std::net::SocketAddr;

use crate::booking::BookingError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: API calls made. Labels: op, outcome.
pub const API_REQUESTS_TOTAL: &str = "roomkeeper_api_requests_total";

/// Histogram: API call latency in seconds. Labels: op.
pub const API_REQUEST_DURATION_SECONDS: &str = "roomkeeper_api_request_duration_seconds";

/// Counter: submissions refused locally before any network call. Labels: kind.
pub const VALIDATION_REJECTIONS_TOTAL: &str = "roomkeeper_validation_rejections_total";

// ── Sweeper ─────────────────────────────────────────────────────

/// Counter: expired bookings selected by sweeps.
pub const SWEEP_CANDIDATES_TOTAL: &str = "roomkeeper_sweep_candidates_total";

/// Counter: expired bookings removed (including ones already gone server-side).
pub const SWEEP_CANCELLED_TOTAL: &str = "roomkeeper_sweep_cancelled_total";

/// Counter: sweep deletions that failed and will be retried next tick.
pub const SWEEP_FAILURES_TOTAL: &str = "roomkeeper_sweep_failures_total";

// ── Cache ───────────────────────────────────────────────────────

/// Gauge: rooms in the local cache.
pub const ROOMS_CACHED: &str = "roomkeeper_rooms_cached";

/// Gauge: bookings in the local cache.
pub const BOOKINGS_CACHED: &str = "roomkeeper_bookings_cached";

/// Counter: rooms found with more than one active booking.
pub const RECONCILE_ANOMALIES_TOTAL: &str = "roomkeeper_reconcile_anomalies_total";

/// Counter: optimistic updates reverted after an API failure. Labels: entity.
pub const ROLLBACKS_TOTAL: &str = "roomkeeper_rollbacks_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map an error to a short label for metrics.
pub fn error_label(err: &BookingError) -> &'static str {
    match err {
        BookingError::MissingField(_) => "missing_field",
        BookingError::InvalidOrder => "invalid_order",
        BookingError::RoomClosed(_) => "room_closed",
        BookingError::OutOfBounds(_) => "out_of_bounds",
        BookingError::Overlap(_) => "overlap",
        BookingError::MissingAuth => "missing_auth",
        BookingError::NotPermitted(_) => "not_permitted",
        BookingError::InFlight(_) => "in_flight",
        BookingError::NetworkFailure(_) => "network_failure",
        BookingError::NotFound(_) => "not_found",
        BookingError::Rejected { .. } => "rejected",
        BookingError::Protocol(_) => "protocol",
    }
}

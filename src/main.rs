use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roomkeeper::api::{AuthApi, HttpApi};
use roomkeeper::booking::BookingError;
use roomkeeper::clock;
use roomkeeper::config::Config;
use roomkeeper::model::UserId;
use roomkeeper::service::BookingService;
use roomkeeper::session::{Role, Session, SessionContext};
use roomkeeper::sweeper::BackgroundTasks;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    roomkeeper::observability::init(config.metrics_port)?;

    let api = Arc::new(HttpApi::new(&config.api_url, config.timeout)?);
    let session = SessionContext::new();
    if let Some(restored) = restore_session(&config, api.as_ref()).await? {
        session.login(restored);
    }

    if let Some(s) = session.current()
        && s.role == Role::User
        && s.actor.is_none()
    {
        warn!("no user id for this session; set ROOMKEEPER_USER_ID to cancel bookings by hand");
    }

    info!("roomkeeper using {}", config.api_url);
    info!("  role: {:?}", session.role());
    info!("  sweep every {}s, refresh every {}s", config.sweep_interval.as_secs(), config.refresh_interval.as_secs());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let service = Arc::new(BookingService::new(api, session.clone(), config.policy, config.timeout));
    match service.refresh().await {
        Ok(()) => {
            for view in service.views(clock::now_ms()).values() {
                info!(room = %view.room_id, status = ?view.status, "{}", view.name);
            }
        }
        Err(BookingError::MissingAuth) => warn!("not logged in; background work idles until a session exists"),
        Err(e) => warn!("initial refresh failed: {e}"),
    }

    let tasks = BackgroundTasks::spawn(service, config.sweep_interval, config.refresh_interval);

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;
    info!("shutdown signal received, stopping background tasks");

    // An in-flight sweep gets up to 10s to finish
    if tokio::time::timeout(Duration::from_secs(10), tasks.shutdown()).await.is_err() {
        warn!("background tasks did not stop in time");
    }

    if let Some(path) = &config.session_file {
        if let Err(e) = session.save(path) {
            warn!("could not persist session to {}: {e}", path.display());
        }
    }

    info!("roomkeeper stopped");
    Ok(())
}

/// Persisted session first, then a configured token, then a login.
async fn restore_session(config: &Config, auth: &dyn AuthApi) -> Result<Option<Session>, BookingError> {
    if let Some(path) = &config.session_file {
        match SessionContext::load(path) {
            Ok(Some(session)) => {
                info!("restored session from {}", path.display());
                return Ok(Some(session));
            }
            Ok(None) => {}
            Err(e) => warn!("could not read session file {}: {e}", path.display()),
        }
    }
    if let Some(token) = &config.token {
        return Ok(Some(Session {
            token: token.clone(),
            role: config.role,
            actor: config.user_id.as_deref().map(UserId::from),
        }));
    }
    if let Some(credentials) = &config.credentials {
        let session = auth.login(credentials).await?;
        info!(student_id = %credentials.student_id, "logged in");
        return Ok(Some(session));
    }
    Ok(None)
}

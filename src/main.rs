use std::sync::Arc;

use tracing::warn;
use tracing_subscriber::EnvFilter;

use rescue_router::api;
use rescue_router::calendar::CalendarClient;
use rescue_router::calendar::google::GoogleCalendarClient;
use rescue_router::calendar::local::LocalCalendar;
use rescue_router::config::Config;
use rescue_router::error::AppError;
use rescue_router::geo::HaversineDistance;
use rescue_router::state::AppState;
use rescue_router::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let calendar: Arc<dyn CalendarClient> = match config.calendar.clone() {
        Some(calendar_config) => Arc::new(
            GoogleCalendarClient::new(calendar_config)
                .map_err(|err| AppError::Internal(format!("calendar client: {err}")))?,
        ),
        None => {
            warn!("GOOGLE_CALENDAR_ID not set; calendar events are kept in memory only");
            Arc::new(LocalCalendar::new())
        }
    };

    let state = Arc::new(AppState::new(
        Arc::new(MemoryStore::new()),
        calendar,
        Arc::new(HaversineDistance),
        config.time_zone,
        config.event_buffer_size,
    )
    .with_max_recurrence_instances(config.max_recurrence_instances));

    let app = api::rest::router(state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        time_zone = %config.time_zone,
        "http server started"
    );

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

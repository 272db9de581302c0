use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use navbat::config::AppConfig;
use navbat::db;
use navbat::handlers;
use navbat::services::notify::telegram::TelegramNotifier;
use navbat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.telegram_bot_token.is_empty() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications will fail until configured");
    }
    let notifier = TelegramNotifier::new(config.telegram_bot_token.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier: Arc::new(notifier),
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/telegram", post(handlers::webhook::telegram_webhook))
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/api/bookings/pending", get(handlers::bookings::list_pending))
        .route(
            "/api/bookings/available-slots",
            get(handlers::bookings::available_slots),
        )
        .route(
            "/api/bookings/statistics",
            get(handlers::bookings::get_statistics),
        )
        .route(
            "/api/bookings/doctor/:id",
            get(handlers::bookings::list_by_doctor),
        )
        .route(
            "/api/bookings/client/:id",
            get(handlers::bookings::list_by_client),
        )
        .route(
            "/api/bookings/:id/status",
            patch(handlers::bookings::update_status),
        )
        .route("/api/bookings/:id", delete(handlers::bookings::delete_booking))
        .route(
            "/api/doctors",
            post(handlers::doctors::create_doctor).get(handlers::doctors::list_doctors),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

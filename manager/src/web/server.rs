use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Serve the API until `cancel` fires. Peer addresses are exposed to
/// handlers through `ConnectInfo`.
pub async fn start_web_server(state: AppState, cancel: CancellationToken) -> Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === DEVICE ANNOUNCEMENTS ===
        .route("/api/devices/announce", put(handlers::announce_device))
        // === DEVICE ROUTES ===
        .route("/api/devices", get(handlers::list_devices))
        .route(
            "/api/devices/{serial}",
            get(handlers::get_device)
                .patch(handlers::update_device)
                .delete(handlers::delete_device),
        )
        .route("/api/devices/{serial}/sync", post(handlers::sync_device))
        .route("/api/devices/{serial}/health", get(handlers::get_device_health))
        .route(
            "/api/devices/{serial}/health/history",
            get(handlers::get_device_health_history),
        )
        .route(
            "/api/devices/{serial}/subscribers",
            post(handlers::provision_subscriber),
        )
        .route(
            "/api/devices/{serial}/bandwidths",
            post(handlers::push_bandwidth_profile),
        )
        .route("/api/devices/{serial}/firmware", post(handlers::push_firmware))
        .route("/api/devices/{serial}/signal", get(handlers::measure_signal))
        // === ALARM ROUTES ===
        .route(
            "/api/devices/{serial}/alarms",
            get(handlers::get_device_alarms).post(handlers::raise_manual_alarm),
        )
        .route("/api/alarms/{id}/close", post(handlers::close_alarm))
        .route("/api/alarms/{id}/acknowledge", post(handlers::acknowledge_alarm))
        // === SETTINGS ROUTES ===
        .route(
            "/api/settings",
            get(handlers::get_runtime_settings).put(handlers::update_runtime_settings),
        )
        .route("/api/audit", get(handlers::get_audit_log))
        // Add middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

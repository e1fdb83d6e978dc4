use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::get_status))
        // Capture control
        .route("/capture/request", post(handlers::request_capture))
        .route("/capture/denied", post(handlers::permission_denied))
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop", post(handlers::stop_capture))
        .route("/capture/revoked", post(handlers::grant_revoked))
        // Session records
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:session_id/events", post(handlers::record_event))
        // Analysis
        .route("/ask", post(handlers::ask))
        .route("/summary", post(handlers::summarize))
        .route("/insights", post(handlers::insights))
        // AI settings
        .route(
            "/config",
            get(handlers::get_config).put(handlers::update_config),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

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
        // Practice session lifecycle
        .route("/practice/start", post(handlers::start_session))
        .route("/practice/:session_id/audio", post(handlers::submit_audio))
        .route("/practice/:session_id/text", post(handlers::submit_text))
        .route(
            "/practice/:session_id/complete",
            post(handlers::complete_session),
        )
        .route("/practice/:session_id", get(handlers::get_session))
        // Coin ledger
        .route("/ledger", get(handlers::get_ledger))
        .route("/ledger/reset", post(handlers::reset_ledger))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

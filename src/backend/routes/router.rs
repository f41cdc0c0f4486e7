//! Router Configuration
//!
//! Combines the REST endpoints and the WebSocket upgrade into one Axum
//! router. CORS is permissive because browser clients connect from their
//! own origins; auth happens per request, not per origin.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::backend::realtime::websocket_handler;
use crate::backend::routes::handlers::{get_message_history, health, ready};
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured.
///
/// - `GET /ws` - WebSocket upgrade, token in query string
/// - `GET /api/v1/messages/{friend_id}` - history page, bearer auth
/// - `GET /api/v1/health` - liveness
/// - `GET /api/v1/ready` - readiness, 503 while draining
pub fn create_router(state: AppState) -> Router<()> {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/v1/messages/{friend_id}", get(get_message_history))
        .route("/api/v1/health", get(health))
        .route("/api/v1/ready", get(ready))
        .fallback(|| async { "404 Not Found" })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

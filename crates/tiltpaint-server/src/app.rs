//! HTTP surface: WebSocket endpoint, health check and the client bundle.

use crate::hub::Hub;
use crate::session;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// State shared by every request handler.
pub struct AppState {
    pub hub: Arc<Hub>,
    pub idle_timeout: Option<Duration>,
}

/// Build the router. Static files are served from `static_dir` when it
/// exists; otherwise `/` answers with a short banner.
pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health));

    let app = match static_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(index)),
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "TiltPaint Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    let idle_timeout = state.idle_timeout;
    ws.on_upgrade(move |socket| session::run(socket, hub, idle_timeout))
}

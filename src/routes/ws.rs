use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws;
use crate::state::AppState;
use std::sync::Arc;

/// Create the WebSocket router
///
/// Devices connect on either `/` or `/ws`. Authentication happens inside the
/// session (upgrade header or first frame), see [`ws::run_session`].
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(ws::ws_voice_handler))
        .route("/ws", get(ws::ws_voice_handler))
        .layer(TraceLayer::new_for_http())
}

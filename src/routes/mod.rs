//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One websocket endpoint per canvas under the configured prefix
//! (`/orange/{canvas_id}` by default), plus a health probe and a read-only
//! canvas summary. Anything else is a 404.

pub mod canvases;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let canvas_route = format!("{}/{{*path}}", state.config.path_prefix);

    Router::new()
        .route(&canvas_route, get(ws::handle_ws))
        .route("/api/canvases", get(canvases::list_canvases))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

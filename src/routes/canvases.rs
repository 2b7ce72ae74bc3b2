//! Read-only canvas summary route.

use axum::extract::State;
use axum::response::Json;

use crate::services::canvas::CanvasSummary;
use crate::state::AppState;

/// `GET /api/canvases`: shape, connection, and session counts per canvas.
pub async fn list_canvases(State(state): State<AppState>) -> Json<Vec<CanvasSummary>> {
    Json(state.canvases.summaries().await)
}

//! WebSocket handler: one canvas session per socket.
//!
//! DESIGN
//! ======
//! On upgrade, attaches a fresh session to the canvas named by the last path
//! segment and enters a `select!` loop:
//! - Incoming client messages → dispatcher (apply + broadcast to peers)
//! - Broadcast frames from canvas peers → forward to client
//!
//! The dispatcher owns state and fan-out. This layer owns the socket: the
//! snapshot, the optional `rejected` reply, and detach on close.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → attach → send `initial-circles`
//! 2. Client messages → dispatch → peers receive the canonical event
//! 3. Close (or send failure) → detach

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RejectPolicy;
use crate::frame::Frame;
use crate::services::dispatch::{self, Outcome};
use crate::state::{AppState, CanvasState, Session};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, Path(path): Path<String>, ws: WebSocketUpgrade) -> Response {
    let Some(canvas_id) = canvas_id_from_path(&path) else {
        return (StatusCode::NOT_FOUND, "canvas id required").into_response();
    };
    let canvas_id = canvas_id.to_string();

    ws.on_upgrade(move |socket| run_ws(socket, state, canvas_id))
}

/// Canvas id is the last segment of the path below the prefix.
pub(crate) fn canvas_id_from_path(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|id| !id.is_empty())
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, canvas_id: String) {
    let session_id = Uuid::new_v4();

    // Per-session channel for frames broadcast by canvas peers.
    let (session_tx, mut session_rx) = mpsc::channel::<Arc<str>>(state.config.session_channel_capacity);
    let attached = state
        .canvases
        .attach(&canvas_id, Session { id: session_id, tx: session_tx })
        .await;

    info!(%canvas_id, %session_id, "ws: client connected");

    // The snapshot goes out before the channel is drained, so it always
    // precedes every broadcast this session receives.
    if send_frame(&mut socket, &attached.snapshot).await.is_ok() {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    let text = match msg {
                        Message::Text(text) => text.as_str().to_owned(),
                        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(%session_id, error = %e, "ws: non-utf8 binary message dropped");
                                continue;
                            }
                        },
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    if let Some(reply) = process_inbound_text(&state, &attached.canvas, session_id, &text).await {
                        if send_frame(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(payload) = session_rx.recv() => {
                    if socket.send(Message::Text(String::from(payload.as_ref()).into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    state.canvases.detach(&canvas_id, session_id).await;
    info!(%canvas_id, %session_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Dispatch one inbound message and return the frame owed to the sender, if
/// any. Peers are served by the dispatcher; the sender only ever hears back
/// under the `notify` reject policy.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    canvas: &Mutex<CanvasState>,
    session_id: Uuid,
    text: &str,
) -> Option<Frame> {
    match dispatch::dispatch(canvas, session_id, text).await {
        Outcome::Applied { .. } => None,
        Outcome::Ignored(reason) => match state.config.reject_policy {
            RejectPolicy::Silent => None,
            RejectPolicy::Notify => Some(Frame::rejected(&reason)),
        },
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, kind = frame.kind(), "ws: failed to serialize frame");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

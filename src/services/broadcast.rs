//! Broadcast router: best-effort fan-out to the sessions of one canvas.
//!
//! DESIGN
//! ======
//! A frame is serialized once and the shared payload is queued on every
//! session channel except the originator's. Queuing uses `try_send`, so a
//! slow peer (full channel) or a dead one (closed channel) is skipped
//! without stalling the caller or the other recipients. Nothing is retried.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::frame::Frame;
use crate::services::canvas::CanvasRegistry;
use crate::state::CanvasState;

/// What happened to one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Sessions the frame was queued for.
    pub delivered: usize,
    /// Sessions whose transport is gone.
    pub closed: usize,
    /// Sessions whose outbound buffer was full.
    pub lagged: usize,
}

/// Queue `frame` for every session on `canvas` except `exclude`.
///
/// Callers hold the canvas lock, which keeps fan-out atomic with respect to
/// other mutations on the same canvas.
pub fn fan_out(canvas: &CanvasState, frame: &Frame, exclude: Option<Uuid>) -> Delivery {
    let mut delivery = Delivery::default();
    if canvas.sessions.is_empty() {
        return delivery;
    }

    let payload: Arc<str> = match serde_json::to_string(frame) {
        Ok(json) => json.into(),
        Err(e) => {
            warn!(error = %e, kind = frame.kind(), "broadcast: failed to serialize frame");
            return delivery;
        }
    };

    for (session_id, tx) in &canvas.sessions {
        if exclude == Some(*session_id) {
            continue;
        }
        match tx.try_send(Arc::clone(&payload)) {
            Ok(()) => delivery.delivered += 1,
            Err(TrySendError::Closed(_)) => delivery.closed += 1,
            Err(TrySendError::Full(_)) => {
                debug!(%session_id, kind = frame.kind(), "broadcast: session lagging, frame skipped");
                delivery.lagged += 1;
            }
        }
    }
    delivery
}

/// Broadcast to a canvas by id. Unknown canvases receive nothing.
pub async fn broadcast(registry: &CanvasRegistry, canvas_id: &str, frame: &Frame, exclude: Option<Uuid>) -> Delivery {
    let Some(handle) = registry.get(canvas_id).await else {
        return Delivery::default();
    };
    let canvas = handle.lock().await;
    fan_out(&canvas, frame, exclude)
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;

//! Mutation dispatcher: decode, apply, and rebroadcast client events.
//!
//! DESIGN
//! ======
//! `decode` turns raw socket text into a typed `ClientFrame`. `apply` is
//! pure business logic: it validates one event against a `CanvasState`,
//! mutates it, and returns the canonical frame peers should see. `dispatch`
//! ties both together under the canvas lock and hands the result to the
//! broadcast router before releasing it, so apply+broadcast of two events on
//! one canvas never interleave.
//!
//! CONFLICT RESOLUTION
//! ===================
//! Renames carry a Lamport-style timestamp and only win over a stored name
//! with a smaller one, so concurrent renames converge regardless of arrival
//! order. Every other mutation is last-writer-wins by arrival order.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here fails a session. Bad input and unknown targets come back as
//! `Outcome::Ignored` with a typed reason; the socket layer decides whether
//! the sender hears about it.

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::frame::{self, ClientFrame, ErrorCode, Frame};
use crate::services::broadcast::{self, Delivery};
use crate::state::CanvasState;

// =============================================================================
// TYPES
// =============================================================================

/// Why an inbound event changed nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ignored {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown event type: {0}")]
    UnknownKind(String),
    #[error("event type {0} is sent by the server only")]
    ServerOnly(String),
    #[error("circle not found: {0}")]
    UnknownShape(String),
    #[error("connection not found: {0}")]
    UnknownConnection(String),
    #[error("circle already exists: {0}")]
    DuplicateShape(String),
    #[error("connection already exists: {0}")]
    DuplicateConnection(String),
    #[error("stale rename: timestamp {incoming} <= current {current}")]
    StaleRename { incoming: i64, current: i64 },
}

impl ErrorCode for Ignored {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED",
            Self::UnknownKind(_) => "E_UNKNOWN_KIND",
            Self::ServerOnly(_) => "E_SERVER_ONLY",
            Self::UnknownShape(_) => "E_CIRCLE_NOT_FOUND",
            Self::UnknownConnection(_) => "E_CONNECTION_NOT_FOUND",
            Self::DuplicateShape(_) => "E_CIRCLE_EXISTS",
            Self::DuplicateConnection(_) => "E_CONNECTION_EXISTS",
            Self::StaleRename { .. } => "E_STALE_RENAME",
        }
    }
}

/// Result of dispatching one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// State changed; `event` went to the other sessions.
    Applied { event: Frame, delivery: Delivery },
    /// State unchanged, nothing broadcast.
    Ignored(Ignored),
}

// =============================================================================
// DECODE
// =============================================================================

/// Parse one inbound text message into a client event.
///
/// # Errors
///
/// `Malformed` for invalid JSON or a known type with a bad payload,
/// `UnknownKind` for an unrecognized or missing `type`, `ServerOnly` for
/// kinds clients may not send.
pub fn decode(text: &str) -> Result<ClientFrame, Ignored> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| Ignored::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if frame::SERVER_ONLY_TYPES.contains(&kind.as_str()) {
        return Err(Ignored::ServerOnly(kind));
    }
    if !frame::CLIENT_TYPES.contains(&kind.as_str()) {
        return Err(Ignored::UnknownKind(kind));
    }

    serde_json::from_value(value).map_err(|e| Ignored::Malformed(format!("{kind}: {e}")))
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply one event to a canvas and return the frame to rebroadcast.
///
/// # Errors
///
/// Returns the reason the event was ignored; the canvas is unchanged.
pub fn apply(canvas: &mut CanvasState, event: ClientFrame) -> Result<Frame, Ignored> {
    match event {
        ClientFrame::NewCircle { circle } => {
            let id = match circle.supplied_id() {
                Some(id) if canvas.shapes.contains_key(id) => return Err(Ignored::DuplicateShape(id.to_string())),
                Some(id) => id.to_string(),
                None => fresh_id(),
            };
            let shape = circle.into_shape(id);
            canvas.shapes.insert(shape.id.clone(), shape.clone());
            Ok(Frame::NewCircle { circle: shape })
        }
        ClientFrame::UpdateCircle { mut circle } => {
            let Some(stored) = canvas.shapes.get_mut(&circle.id) else {
                return Err(Ignored::UnknownShape(circle.id));
            };
            // A full replace must not roll back the rename clock.
            circle.last_updated = circle.last_updated.max(stored.last_updated);
            *stored = circle.clone();
            Ok(Frame::UpdateCircle { circle })
        }
        ClientFrame::UpdateCircleColor { circle } => {
            let Some(stored) = canvas.shapes.get_mut(&circle.id) else {
                return Err(Ignored::UnknownShape(circle.id));
            };
            stored.color = circle.color;
            Ok(Frame::UpdateCircleColor { circle })
        }
        ClientFrame::UpdateCircleName { circle_id, new_name, timestamp } => {
            let Some(stored) = canvas.shapes.get_mut(&circle_id) else {
                return Err(Ignored::UnknownShape(circle_id));
            };
            let timestamp = timestamp.unwrap_or_else(|| next_timestamp(stored.last_updated));
            if timestamp <= stored.last_updated {
                return Err(Ignored::StaleRename { incoming: timestamp, current: stored.last_updated });
            }
            stored.name.clone_from(&new_name);
            stored.last_updated = timestamp;
            Ok(Frame::UpdateCircleName { circle_id, new_name, timestamp })
        }
        ClientFrame::NewConnection { connection } => {
            let id = match connection.supplied_id() {
                Some(id) if canvas.connections.contains_key(id) => {
                    return Err(Ignored::DuplicateConnection(id.to_string()));
                }
                Some(id) => id.to_string(),
                None => fresh_id(),
            };
            let connection = connection.into_connection(id);
            canvas
                .connections
                .insert(connection.id.clone(), connection.clone());
            Ok(Frame::NewConnection { connection })
        }
        ClientFrame::UpdateConnection { connection } => {
            let Some(stored) = canvas.connections.get_mut(&connection.id) else {
                return Err(Ignored::UnknownConnection(connection.id));
            };
            *stored = connection.clone();
            Ok(Frame::UpdateConnection { connection })
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode, apply, and rebroadcast one inbound message from `origin`.
pub async fn dispatch(canvas: &Mutex<CanvasState>, origin: Uuid, text: &str) -> Outcome {
    let event = match decode(text) {
        Ok(event) => event,
        Err(reason) => {
            debug!(session_id = %origin, code = reason.error_code(), %reason, "dispatch: dropped inbound message");
            return Outcome::Ignored(reason);
        }
    };
    let kind = event.kind();

    let mut canvas = canvas.lock().await;
    match apply(&mut canvas, event) {
        Ok(frame) => {
            let delivery = broadcast::fan_out(&canvas, &frame, Some(origin));
            debug!(
                session_id = %origin,
                kind,
                delivered = delivery.delivered,
                closed = delivery.closed,
                lagged = delivery.lagged,
                "dispatch: applied"
            );
            Outcome::Applied { event: frame, delivery }
        }
        Err(reason) => {
            debug!(session_id = %origin, kind, code = reason.error_code(), %reason, "dispatch: ignored");
            Outcome::Ignored(reason)
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Timestamp for a rename that arrived without one: wall clock, but always
/// past the stored clock so the rename wins.
fn next_timestamp(current: i64) -> i64 {
    frame::now_ms().max(current.saturating_add(1))
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;

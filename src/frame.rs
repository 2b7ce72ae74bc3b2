//! Frame: the wire envelope for canvas synchronization.
//!
//! ARCHITECTURE
//! ============
//! Every message on a canvas socket is a single JSON object whose `type`
//! field selects the event kind. Clients send `ClientFrame`s; the server
//! emits `Frame`s. Decoding happens once at the socket boundary so the
//! dispatcher works on typed variants with exhaustive matches.
//!
//! DESIGN
//! ======
//! - Server frames are self-contained: shape and connection events always
//!   carry full records with assigned ids.
//! - Client frames may omit ids on create and the timestamp on rename.
//! - `initial-circles` and `rejected` are server-only kinds.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::state::{Color, Connection, ConnectionDraft, Shape, ShapeDraft};

// =============================================================================
// TYPE TAGS
// =============================================================================

pub const TYPE_INITIAL_CIRCLES: &str = "initial-circles";
pub const TYPE_NEW_CIRCLE: &str = "new-circle";
pub const TYPE_UPDATE_CIRCLE: &str = "update-circle";
pub const TYPE_UPDATE_CIRCLE_COLOR: &str = "update-circle-color";
pub const TYPE_UPDATE_CIRCLE_NAME: &str = "update-circle-name";
pub const TYPE_NEW_CONNECTION: &str = "new-connection";
pub const TYPE_UPDATE_CONNECTION: &str = "update-connection";
pub const TYPE_REJECTED: &str = "rejected";

/// Kinds a client may send.
pub const CLIENT_TYPES: [&str; 6] = [
    TYPE_NEW_CIRCLE,
    TYPE_UPDATE_CIRCLE,
    TYPE_UPDATE_CIRCLE_COLOR,
    TYPE_UPDATE_CIRCLE_NAME,
    TYPE_NEW_CONNECTION,
    TYPE_UPDATE_CONNECTION,
];

/// Kinds only the server emits.
pub const SERVER_ONLY_TYPES: [&str; 2] = [TYPE_INITIAL_CIRCLES, TYPE_REJECTED];

// =============================================================================
// TYPES
// =============================================================================

/// Color change payload: the target id and its new color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorChange {
    pub id: String,
    pub color: Color,
}

/// Server → client event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Frame {
    /// Full canvas contents, sent once right after attach.
    InitialCircles { circles: Vec<Shape>, connections: Vec<Connection> },
    NewCircle { circle: Shape },
    UpdateCircle { circle: Shape },
    UpdateCircleColor { circle: ColorChange },
    UpdateCircleName { circle_id: String, new_name: String, timestamp: i64 },
    NewConnection { connection: Connection },
    UpdateConnection { connection: Connection },
    /// Sent to the originating session only, and only when the server runs
    /// with the `notify` reject policy.
    Rejected { code: String, message: String },
}

/// Client → server event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    NewCircle { circle: ShapeDraft },
    UpdateCircle { circle: Shape },
    UpdateCircleColor { circle: ColorChange },
    UpdateCircleName {
        circle_id: String,
        new_name: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    NewConnection { connection: ConnectionDraft },
    UpdateConnection { connection: Connection },
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured `rejected` frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Build a `rejected` frame from a typed error.
    #[must_use]
    pub fn rejected(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Rejected { code: err.error_code().to_string(), message: err.to_string() }
    }

    /// The wire `type` tag of this frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitialCircles { .. } => TYPE_INITIAL_CIRCLES,
            Self::NewCircle { .. } => TYPE_NEW_CIRCLE,
            Self::UpdateCircle { .. } => TYPE_UPDATE_CIRCLE,
            Self::UpdateCircleColor { .. } => TYPE_UPDATE_CIRCLE_COLOR,
            Self::UpdateCircleName { .. } => TYPE_UPDATE_CIRCLE_NAME,
            Self::NewConnection { .. } => TYPE_NEW_CONNECTION,
            Self::UpdateConnection { .. } => TYPE_UPDATE_CONNECTION,
            Self::Rejected { .. } => TYPE_REJECTED,
        }
    }
}

impl ClientFrame {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewCircle { .. } => TYPE_NEW_CIRCLE,
            Self::UpdateCircle { .. } => TYPE_UPDATE_CIRCLE,
            Self::UpdateCircleColor { .. } => TYPE_UPDATE_CIRCLE_COLOR,
            Self::UpdateCircleName { .. } => TYPE_UPDATE_CIRCLE_NAME,
            Self::NewConnection { .. } => TYPE_NEW_CONNECTION,
            Self::UpdateConnection { .. } => TYPE_UPDATE_CONNECTION,
        }
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;

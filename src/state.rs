//! Shared application state and the canvas data model.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the canvas registry and the server configuration. Each canvas
//! has its own in-memory shape and connection maps plus the outbound
//! channels of the sessions attached to it.
//!
//! Shapes and connections live in insertion-ordered maps so snapshots list
//! records in the order they were created. Every map key equals the `id` of
//! the record stored under it.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame::Frame;
use crate::services::canvas::CanvasRegistry;

/// Radius the view layer draws when a client omits `r`.
pub const DEFAULT_RADIUS: f64 = 28.0;

// =============================================================================
// SHAPE
// =============================================================================

/// Fill color of a circle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Orange,
    Blue,
}

/// A labelled circle on a canvas. `id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_radius")]
    pub r: f64,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub name: String,
    /// Lamport-style timestamp of the last applied rename.
    #[serde(default)]
    pub last_updated: i64,
}

/// Inbound shape payload for `new-circle`; the id is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_radius")]
    pub r: f64,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_updated: i64,
}

impl ShapeDraft {
    /// Id supplied by the creator, treating an empty string as absent.
    #[must_use]
    pub fn supplied_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn into_shape(self, id: String) -> Shape {
        Shape { id, x: self.x, y: self.y, r: self.r, color: self.color, name: self.name, last_updated: self.last_updated }
    }
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Which side of the start shape a connection leaves from.
///
/// Encoded on the wire as `0` (left) or `1` (right). The names `"left"` and
/// `"right"` are accepted on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SideRepr", into = "u8")]
pub enum Side {
    #[default]
    Left,
    Right,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SideRepr {
    Index(u8),
    Name(String),
}

impl TryFrom<SideRepr> for Side {
    type Error = String;

    fn try_from(repr: SideRepr) -> Result<Self, Self::Error> {
        match repr {
            SideRepr::Index(0) => Ok(Side::Left),
            SideRepr::Index(1) => Ok(Side::Right),
            SideRepr::Name(name) if name == "left" => Ok(Side::Left),
            SideRepr::Name(name) if name == "right" => Ok(Side::Right),
            SideRepr::Index(other) => Err(format!("invalid lr index: {other}")),
            SideRepr::Name(other) => Err(format!("invalid lr name: {other}")),
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// A directed link between two shapes. Endpoints are referenced, not owned,
/// and may point at shapes that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub start_id: String,
    pub end_id: String,
    #[serde(default)]
    pub lr: Side,
}

/// Inbound connection payload for `new-connection`; the id is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub start_id: String,
    pub end_id: String,
    #[serde(default)]
    pub lr: Side,
}

impl ConnectionDraft {
    #[must_use]
    pub fn supplied_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn into_connection(self, id: String) -> Connection {
        Connection { id, start_id: self.start_id, end_id: self.end_id, lr: self.lr }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Outbound half of a session: serialized frames queued for its socket.
pub type SessionTx = mpsc::Sender<Arc<str>>;

/// One client's live connection to a canvas.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub tx: SessionTx,
}

// =============================================================================
// CANVAS STATE
// =============================================================================

/// Authoritative live state of one canvas.
#[derive(Debug, Default)]
pub struct CanvasState {
    /// Shapes keyed by id, in insertion order.
    pub shapes: IndexMap<String, Shape>,
    /// Connections keyed by id, in insertion order.
    pub connections: IndexMap<String, Connection>,
    /// Attached sessions: `session_id` -> outbound channel.
    pub sessions: HashMap<Uuid, SessionTx>,
    /// Set once the registry has dropped this canvas. A retired canvas never
    /// accepts new sessions.
    pub retired: bool,
}

impl CanvasState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full contents as an `initial-circles` frame.
    #[must_use]
    pub fn snapshot(&self) -> Frame {
        Frame::InitialCircles {
            circles: self.shapes.values().cloned().collect(),
            connections: self.connections.values().cloned().collect(),
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub canvases: Arc<CanvasRegistry>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let canvases = CanvasRegistry::with_eviction(config.evict_idle_canvases);
        Self { canvases: Arc::new(canvases), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

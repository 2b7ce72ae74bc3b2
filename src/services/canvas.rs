//! Canvas registry: lazy creation, attach/detach, and lookup.
//!
//! DESIGN
//! ======
//! The registry maps a canvas id (taken verbatim from the socket path) to a
//! per-canvas `Mutex<CanvasState>`. The map lock is only held long enough to
//! look up or insert a handle; all canvas work happens under the canvas lock,
//! so unrelated canvases never contend.
//!
//! Canvases are created on first attach and kept for the process lifetime.
//! With eviction enabled, the last detach drops the canvas; the dropped
//! state is marked `retired` so an attach racing with eviction re-resolves
//! instead of joining an orphan.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{CanvasState, Session};

/// Shared handle to one canvas.
pub type CanvasHandle = Arc<Mutex<CanvasState>>;

/// Result of attaching a session: the canvas it joined and the snapshot that
/// must reach the client before anything else.
pub struct Attached {
    pub canvas: CanvasHandle,
    pub snapshot: Frame,
}

/// Per-canvas counts for the summary endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanvasSummary {
    pub id: String,
    pub circles: usize,
    pub connections: usize,
    pub sessions: usize,
}

#[derive(Default)]
pub struct CanvasRegistry {
    canvases: RwLock<HashMap<String, CanvasHandle>>,
    evict_idle: bool,
}

impl CanvasRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_eviction(evict_idle: bool) -> Self {
        Self { canvases: RwLock::new(HashMap::new()), evict_idle }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Return the canvas for `canvas_id`, creating an empty one if unseen.
    /// Concurrent callers resolving the same unseen id get the same handle.
    pub async fn resolve(&self, canvas_id: &str) -> CanvasHandle {
        if let Some(handle) = self.canvases.read().await.get(canvas_id) {
            return Arc::clone(handle);
        }

        let mut canvases = self.canvases.write().await;
        let handle = canvases.entry(canvas_id.to_string()).or_insert_with(|| {
            info!(%canvas_id, "created canvas");
            Arc::new(Mutex::new(CanvasState::new()))
        });
        Arc::clone(handle)
    }

    /// Existing canvas, without creating one.
    pub async fn get(&self, canvas_id: &str) -> Option<CanvasHandle> {
        self.canvases.read().await.get(canvas_id).cloned()
    }

    /// Ids of every live canvas, sorted.
    pub async fn canvas_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.canvases.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.canvases.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.canvases.read().await.is_empty()
    }

    /// Counts for every live canvas, sorted by id.
    pub async fn summaries(&self) -> Vec<CanvasSummary> {
        let handles: Vec<(String, CanvasHandle)> = self
            .canvases
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let canvas = handle.lock().await;
            out.push(CanvasSummary {
                id,
                circles: canvas.shapes.len(),
                connections: canvas.connections.len(),
                sessions: canvas.sessions.len(),
            });
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    // =========================================================================
    // ATTACH / DETACH
    // =========================================================================

    /// Attach a session to a canvas and return its snapshot.
    ///
    /// The snapshot is taken under the same lock that inserts the session, so
    /// it contains every mutation applied before the attach and none after.
    /// Later mutations reach the session through its channel.
    pub async fn attach(&self, canvas_id: &str, session: Session) -> Attached {
        loop {
            let handle = self.resolve(canvas_id).await;
            let mut canvas = handle.lock().await;
            if canvas.retired {
                continue;
            }

            canvas.sessions.insert(session.id, session.tx.clone());
            let snapshot = canvas.snapshot();
            info!(
                %canvas_id,
                session_id = %session.id,
                sessions = canvas.sessions.len(),
                circles = canvas.shapes.len(),
                connections = canvas.connections.len(),
                "session attached"
            );
            drop(canvas);
            return Attached { canvas: handle, snapshot };
        }
    }

    /// Remove a session from a canvas. Unknown canvases and sessions are a
    /// no-op, so duplicate close signals are harmless.
    pub async fn detach(&self, canvas_id: &str, session_id: Uuid) {
        let Some(handle) = self.get(canvas_id).await else {
            return;
        };

        let now_empty = {
            let mut canvas = handle.lock().await;
            if canvas.sessions.remove(&session_id).is_none() {
                return;
            }
            info!(%canvas_id, %session_id, remaining = canvas.sessions.len(), "session detached");
            canvas.sessions.is_empty()
        };

        if now_empty && self.evict_idle {
            self.evict_if_idle(canvas_id).await;
        }
    }

    /// Drop a canvas that has no sessions. Only reachable with eviction on.
    async fn evict_if_idle(&self, canvas_id: &str) {
        let mut canvases = self.canvases.write().await;
        let Some(handle) = canvases.get(canvas_id).cloned() else {
            return;
        };

        let mut canvas = handle.lock().await;
        if !canvas.sessions.is_empty() {
            return;
        }
        canvas.retired = true;
        canvases.remove(canvas_id);
        info!(%canvas_id, circles = canvas.shapes.len(), "evicted idle canvas");
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;

//! Canvas services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own canvas state and fan-out so the socket handler can
//! stay focused on transport and session lifecycle.

pub mod broadcast;
pub mod canvas;
pub mod dispatch;

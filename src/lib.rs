//! Realtime canvas synchronization server.
//!
//! Clients open a websocket on `/orange/{canvas_id}`, receive the canvas
//! snapshot, and from then on exchange circle and connection events that the
//! server applies to its authoritative copy and relays to every other client
//! on the same canvas.

pub mod config;
pub mod frame;
pub mod routes;
pub mod services;
pub mod state;

/// Failures that stop the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

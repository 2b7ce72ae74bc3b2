//! Server configuration parsed from environment variables.

use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PATH_PREFIX: &str = "/orange";
pub const DEFAULT_SESSION_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("CANVAS_PATH_PREFIX must start with '/' and name a segment, got {0:?}")]
    PathPrefix(String),
}

/// What the server tells a client whose mutation was ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RejectPolicy {
    /// Drop without a reply. The wire contract the view layer expects.
    #[default]
    Silent,
    /// Reply to the sender with a `rejected` frame.
    Notify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Websocket route prefix; the canvas id is the last path segment below it.
    pub path_prefix: String,
    pub session_channel_capacity: usize,
    pub reject_policy: RejectPolicy,
    /// Drop a canvas from the registry when its last session detaches.
    pub evict_idle_canvases: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            session_channel_capacity: DEFAULT_SESSION_CHANNEL_CAPACITY,
            reject_policy: RejectPolicy::Silent,
            evict_idle_canvases: false,
        }
    }
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 8080
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `CANVAS_PATH_PREFIX`: default `/orange`
    /// - `SESSION_CHANNEL_CAPACITY`: default 256
    /// - `REJECT_POLICY`: `silent` (default) or `notify`
    /// - `EVICT_IDLE_CANVASES`: `false` (default) or `true`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is present but unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = parse_or("PORT", lookup("PORT"), defaults.port)?;
        let bind_addr = parse_or("BIND_ADDR", lookup("BIND_ADDR"), defaults.bind_addr)?;
        let session_channel_capacity = parse_or(
            "SESSION_CHANNEL_CAPACITY",
            lookup("SESSION_CHANNEL_CAPACITY"),
            defaults.session_channel_capacity,
        )?;
        if session_channel_capacity == 0 {
            return Err(ConfigError::Invalid { key: "SESSION_CHANNEL_CAPACITY", value: "0".into() });
        }

        let path_prefix = parse_path_prefix(lookup("CANVAS_PATH_PREFIX").as_deref().unwrap_or(DEFAULT_PATH_PREFIX))?;
        let reject_policy = parse_reject_policy(lookup("REJECT_POLICY").as_deref())?;
        let evict_idle_canvases = parse_bool("EVICT_IDLE_CANVASES", lookup("EVICT_IDLE_CANVASES").as_deref())?;

        Ok(Self { bind_addr, port, path_prefix, session_channel_capacity, reject_policy, evict_idle_canvases })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_path_prefix(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with('/') || trimmed.len() < 2 {
        return Err(ConfigError::PathPrefix(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_reject_policy(raw: Option<&str>) -> Result<RejectPolicy, ConfigError> {
    match raw.unwrap_or("silent") {
        "silent" => Ok(RejectPolicy::Silent),
        "notify" => Ok(RejectPolicy::Notify),
        other => Err(ConfigError::Invalid { key: "REJECT_POLICY", value: other.to_string() }),
    }
}

fn parse_bool(key: &'static str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(str::trim) {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(ConfigError::Invalid { key, value: other.to_string() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable      | Default        |
//! |---------------|----------------|
//! | `LISTEN_ADDR` | `0.0.0.0:8001` |
//! | `TOKEN_BYTES` | `12`           |
//! | `LOG_FORMAT`  | `text`         |
//! | `PEER_QUEUE_CAPACITY` | `256`  |

use std::net::SocketAddr;
use std::str::FromStr;

use crate::domain::peer::{DEFAULT_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY};
use crate::domain::session_token::{DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES};
use crate::error::GatewayError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(GatewayError::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP/WebSocket server to.
    pub listen_addr: SocketAddr,

    /// Random bytes per join/watch token (never below
    /// [`MIN_TOKEN_BYTES`]).
    pub token_bytes: usize,

    /// Log output format.
    pub log_format: LogFormat,

    /// Outbound frames a connection may have queued before it is evicted
    /// (never below [`MIN_QUEUE_CAPACITY`]).
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            token_bytes: DEFAULT_TOKEN_BYTES,
            log_format: LogFormat::Text,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or not valid,
    /// except for `LISTEN_ADDR`. Calls `dotenvy::dotenv().ok()` to
    /// optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from `lookup`, which maps a variable name to its
    /// value. [`GatewayConfig::from_env`] passes the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is present but
    /// cannot be parsed as a [`SocketAddr`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| GatewayError::Config(format!("LISTEN_ADDR {raw:?}: {e}")))?,
            None => defaults.listen_addr,
        };

        let token_bytes =
            parse_var(&lookup, "TOKEN_BYTES", defaults.token_bytes).max(MIN_TOKEN_BYTES);
        let log_format = parse_var(&lookup, "LOG_FORMAT", defaults.log_format);
        let queue_capacity = parse_var(&lookup, "PEER_QUEUE_CAPACITY", defaults.queue_capacity)
            .max(MIN_QUEUE_CAPACITY);

        Ok(Self {
            listen_addr,
            token_bytes,
            log_format,
            queue_capacity,
        })
    }
}

/// Parses the variable `key` as `T`, returning `default` on missing or
/// invalid values.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

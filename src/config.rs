//! Client configuration.
//!
//! Loaded from JSON or built in code with [`ClientConfig::new`]. Every field
//! except `token` has a default.
//!
//! ```
//! use pinwire_client::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(r#"{"token": "abc", "port": 8080}"#).unwrap();
//! assert_eq!(config.port, 8080);
//! assert_eq!(config.server, "blynk-cloud.com");
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PinwireError, Result};
use crate::protocol::{DEFAULT_MAX_BODY, STATUS_SUCCESS};

/// Connection and timing settings for one device session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Device auth token.
    pub token: String,
    /// Broker host name.
    #[serde(default = "default_server")]
    pub server: String,
    /// Broker port (default 80).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Heartbeat interval in seconds (default 10).
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Inbound body limit, also declared to the broker (default 1024).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Overall budget for `Client::run`'s reconnect attempts (default 30 s).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Wait for each handshake reply (default 5000 ms).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Per-iteration receive timeout in `run` (default 50 ms).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Pause after each disconnect (default 1000 ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Pause between failed connect attempts (default 50 ms).
    #[serde(default = "default_task_period_ms")]
    pub task_period_ms: u64,
    /// Drive the TCP socket in non-blocking mode with a poll loop instead
    /// of native socket timeouts. Plain TCP only.
    #[serde(default)]
    pub poll_io: bool,
    /// Wrap the socket in TLS.
    #[serde(default)]
    pub tls: bool,
    /// Extra PEM CA bundle trusted for TLS.
    #[serde(default)]
    pub tls_ca_cert: Option<PathBuf>,
}

fn default_server() -> String {
    "blynk-cloud.com".to_string()
}
fn default_port() -> u16 {
    80
}
fn default_heartbeat_secs() -> u64 {
    10
}
fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_handshake_timeout_ms() -> u64 {
    5000
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_task_period_ms() -> u64 {
    50
}

impl ClientConfig {
    /// Default settings for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            server: default_server(),
            port: default_port(),
            heartbeat_secs: default_heartbeat_secs(),
            max_body_bytes: default_max_body_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            task_period_ms: default_task_period_ms(),
            poll_io: false,
            tls: false,
            tls_ca_cert: None,
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `PinwireError::Config` when the token is empty, the heartbeat
    /// is zero, the body limit cannot hold a success status, or the handshake
    /// timeout is not below the heartbeat interval.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(PinwireError::Config("token must not be empty".into()));
        }
        if self.heartbeat_secs == 0 {
            return Err(PinwireError::Config("heartbeat_secs must be positive".into()));
        }
        if self.max_body_bytes <= usize::from(STATUS_SUCCESS) {
            return Err(PinwireError::Config(format!(
                "max_body_bytes must exceed {STATUS_SUCCESS}, got {}",
                self.max_body_bytes
            )));
        }
        if self.tls && self.poll_io {
            return Err(PinwireError::Config(
                "poll_io applies to plain TCP only, not tls".into(),
            ));
        }
        if self.handshake_timeout() >= self.heartbeat() {
            return Err(PinwireError::Config(format!(
                "handshake timeout {:?} must be below heartbeat {:?}",
                self.handshake_timeout(),
                self.heartbeat()
            )));
        }
        Ok(())
    }

    /// Heartbeat interval.
    #[inline]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Budget for one `connect` call.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Wait for each handshake reply.
    #[inline]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Receive timeout for one `run` iteration.
    #[inline]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Pause after each disconnect.
    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Pause between failed connect attempts.
    #[inline]
    pub fn task_period(&self) -> Duration {
        Duration::from_millis(self.task_period_ms)
    }
}

//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparsable numeric values fall
//! back to their defaults; an unparsable listen address is an error.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is set but is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        /// The rejected value.
        value: String,
        /// Parser error.
        source: std::net::AddrParseError,
    },

    /// A setting holds a value outside its allowed range.
    #[error("invalid {key}: {reason}")]
    OutOfRange {
        /// Environment variable name.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:2222`).
    pub listen_addr: SocketAddr,

    /// Capacity of each client's outbound queue. A client whose queue is
    /// full at delivery time is evicted.
    pub outbound_capacity: usize,

    /// Capacity of the hub's request queue.
    pub hub_command_capacity: usize,

    /// Maximum silence from a client before its connection is dropped.
    pub read_timeout: Duration,

    /// Maximum time a single frame write may take.
    pub write_timeout: Duration,

    /// Interval between keep-alive pings. Must be shorter than
    /// `read_timeout` so that pongs keep idle clients alive.
    pub ping_interval: Duration,

    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2222)),
            outbound_capacity: 256,
            hub_command_capacity: 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            max_message_size: 64 * 1024,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR` cannot be parsed, a capacity
    /// is zero, or the ping interval is not shorter than the read timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(value) => value
                .parse()
                .map_err(|source| ConfigError::ListenAddr { value, source })?,
            Err(_) => defaults.listen_addr,
        };

        let config = Self {
            listen_addr,
            outbound_capacity: parse_env("OUTBOUND_CAPACITY", defaults.outbound_capacity),
            hub_command_capacity: parse_env("HUB_COMMAND_CAPACITY", defaults.hub_command_capacity),
            read_timeout: parse_secs("WS_READ_TIMEOUT_SECS", defaults.read_timeout),
            write_timeout: parse_secs("WS_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            ping_interval: parse_secs("WS_PING_INTERVAL_SECS", defaults.ping_interval),
            max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", defaults.max_message_size),
            log_format: parse_env("LOG_FORMAT", defaults.log_format),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: "OUTBOUND_CAPACITY",
                reason: "must be at least 1",
            });
        }
        if self.hub_command_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: "HUB_COMMAND_CAPACITY",
                reason: "must be at least 1",
            });
        }
        if self.ping_interval.is_zero() || self.ping_interval >= self.read_timeout {
            return Err(ConfigError::OutOfRange {
                key: "WS_PING_INTERVAL_SECS",
                reason: "must be non-zero and shorter than WS_READ_TIMEOUT_SECS",
            });
        }
        Ok(())
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

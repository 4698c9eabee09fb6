//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built once in `main.rs` from CLI arguments, environment variables and
//! an optional TOML file, then shared with every session task.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) lets tests spin up independent servers with
//! their own settings side by side.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use checkbox_core::{WireFormat, DEFAULT_CHECKBOX_COUNT, MAX_INDEX};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors found when validating a [`ServerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The grid must hold at least one checkbox and fit the 24-bit wire index.
    #[error("checkbox count must be between 1 and {max}, got {got}")]
    InvalidCheckboxCount { got: u32, max: u32 },

    /// Outbound queues need room for at least one frame.
    #[error("outbound queue capacity must be at least 1")]
    InvalidQueueCapacity,

    /// The bit-vector key name must not be empty.
    #[error("bitfield key must not be empty")]
    EmptyBitfieldKey,
}

/// Which bit store implementation backs the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Redis `BITFIELD` on a single key.  State survives restarts.
    #[default]
    Redis,
    /// Process-local bit vector.  State is lost on exit.
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Redis => f.write_str("redis"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}' (expected 'redis' or 'memory')")),
        }
    }
}

/// Where and how the checkbox bits are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis `host:port`.
    pub redis_addr: String,

    /// Redis password; `None` connects without `AUTH`.
    pub redis_password: Option<String>,

    /// Redis logical database number.
    pub redis_db: i64,

    /// Name of the key holding the bit vector.
    pub bitfield_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_addr: "localhost:6379".to_string(),
            redis_password: None,
            redis_db: 0,
            bitfield_key: "checkboxes".to_string(),
        }
    }
}

/// All runtime configuration for the server.
///
/// # Example
///
/// ```rust
/// use checkbox_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert_eq!(cfg.checkbox_count, 100);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Size N of the index space replayed to each new client.
    pub checkbox_count: u32,

    /// Format a client is written to until it sends its first message.
    ///
    /// After that each client receives the format it last spoke.
    pub wire_format: WireFormat,

    /// Capacity of each connection's outbound queue.
    ///
    /// Broadcasts to a connection whose queue is full are dropped.
    pub outbound_queue: usize,

    /// Upper bound on a single socket write before the session is closed.
    pub write_timeout: Duration,

    pub store: StoreConfig,
}

impl ServerConfig {
    /// Checks the invariants the rest of the server relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = MAX_INDEX + 1;
        if self.checkbox_count == 0 || self.checkbox_count > max {
            return Err(ConfigError::InvalidCheckboxCount {
                got: self.checkbox_count,
                max,
            });
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if self.store.bitfield_key.is_empty() {
            return Err(ConfigError::EmptyBitfieldKey);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    /// | Field           | Default          |
    /// |-----------------|------------------|
    /// | bind_addr       | `0.0.0.0:8080`   |
    /// | checkbox_count  | 100              |
    /// | wire_format     | text             |
    /// | outbound_queue  | 256              |
    /// | write_timeout   | 5 seconds        |
    /// | store           | Redis on `localhost:6379`, key `checkboxes` |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            checkbox_count: DEFAULT_CHECKBOX_COUNT,
            wire_format: WireFormat::Text,
            outbound_queue: 256,
            write_timeout: Duration::from_secs(5),
            store: StoreConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8080() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8080);
    }

    #[test]
    fn test_default_store_is_local_redis() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.store.backend, StoreBackend::Redis);
        assert_eq!(cfg.store.redis_addr, "localhost:6379");
        assert_eq!(cfg.store.bitfield_key, "checkboxes");
    }

    #[test]
    fn test_default_wire_format_is_json() {
        assert_eq!(ServerConfig::default().wire_format, WireFormat::Text);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ServerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_checkboxes_rejected() {
        let cfg = ServerConfig {
            checkbox_count: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidCheckboxCount { got: 0, .. })
        ));
    }

    #[test]
    fn test_full_24_bit_space_accepted() {
        let cfg = ServerConfig {
            checkbox_count: MAX_INDEX + 1,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_space_beyond_24_bits_rejected() {
        let cfg = ServerConfig {
            checkbox_count: MAX_INDEX + 2,
            ..ServerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_queue_rejected() {
        let cfg = ServerConfig {
            outbound_queue: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidQueueCapacity));
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut cfg = ServerConfig::default();
        cfg.store.bitfield_key.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyBitfieldKey));
    }

    #[test]
    fn test_store_backend_parses() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("redis".parse::<StoreBackend>(), Ok(StoreBackend::Redis));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}

//! Optional TOML configuration file.
//!
//! Every key is optional.  A value set here is used only when neither the
//! matching CLI flag nor its environment variable is present:
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 8080
//! checkbox_count = 100
//! wire_format = "text"       # or "binary"
//! outbound_queue = 256
//! write_timeout_ms = 5000
//! log_level = "info"
//!
//! [store]
//! backend = "redis"          # or "memory"
//! redis_addr = "localhost:6379"
//! redis_password = "hunter2"
//! redis_db = 0
//! bitfield_key = "checkboxes"
//! ```
//!
//! Unknown keys are rejected so that a typo does not silently fall back to a
//! default.

use std::path::{Path, PathBuf};

use checkbox_core::WireFormat;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::StoreBackend;

/// Error type for configuration file loading.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub checkbox_count: Option<u32>,
    pub wire_format: Option<WireFormat>,
    pub outbound_queue: Option<usize>,
    pub write_timeout_ms: Option<u64>,
    /// `tracing` level used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    pub store: FileStoreConfig,
}

/// `[store]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileStoreConfig {
    pub backend: Option<StoreBackend>,
    pub redis_addr: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: Option<i64>,
    pub bitfield_key: Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses a config file from TOML text.
///
/// # Errors
///
/// Returns [`ConfigFileError::Parse`] on malformed TOML, a wrong value type,
/// or an unknown key.
pub fn parse(text: &str) -> Result<FileConfig, ConfigFileError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read, otherwise as
/// [`parse`].
pub fn load(path: &Path) -> Result<FileConfig, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Checkbox grid server entry point.
//!
//! Accepts WebSocket connections, replays the checked boxes to each new
//! client, and relays every toggle to all other clients while persisting it
//! as one bit in Redis.
//!
//! # Usage
//!
//! ```text
//! checkbox-server [OPTIONS]
//!
//! Options:
//!   --bind <IP>                 Listener IP [default: 0.0.0.0]
//!   --port <PORT>               Listener port [default: 8080]
//!   --store <redis|memory>      Bit store backend [default: redis]
//!   --redis-addr <HOST:PORT>    Redis address [default: localhost:6379]
//!   --redis-password <PASS>     Redis password
//!   --redis-db <N>              Redis logical database [default: 0]
//!   --bitfield-key <KEY>        Key holding the bit vector [default: checkboxes]
//!   --checkbox-count <N>        Size of the grid replayed on connect [default: 100]
//!   --wire-format <binary|text> Encoding for a client that has not spoken yet [default: text]
//!   --outbound-queue <N>        Per-connection queue capacity [default: 256]
//!   --write-timeout-ms <MS>     Socket write bound [default: 5000]
//!   --config <PATH>             Optional TOML config file
//!   --log-level <LEVEL>         Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Precedence
//!
//! CLI flag, then environment variable, then config file, then built-in
//! default.
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `CHECKBOX_BIND`             | `--bind`             |
//! | `CHECKBOX_PORT`             | `--port`             |
//! | `CHECKBOX_STORE`            | `--store`            |
//! | `REDIS_ADDR`                | `--redis-addr`       |
//! | `REDIS_PASSWORD`            | `--redis-password`   |
//! | `REDIS_DB`                  | `--redis-db`         |
//! | `CHECKBOX_BITFIELD_KEY`     | `--bitfield-key`     |
//! | `CHECKBOX_COUNT`            | `--checkbox-count`   |
//! | `CHECKBOX_WIRE_FORMAT`      | `--wire-format`      |
//! | `CHECKBOX_OUTBOUND_QUEUE`   | `--outbound-queue`   |
//! | `CHECKBOX_WRITE_TIMEOUT_MS` | `--write-timeout-ms` |
//! | `CHECKBOX_CONFIG`           | `--config`           |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use checkbox_core::WireFormat;
use checkbox_server::domain::{ServerConfig, StoreBackend, StoreConfig};
use checkbox_server::infrastructure::config_file::{self, FileConfig};
use checkbox_server::infrastructure::{open_store, run_server};

const DEFAULT_LOG_LEVEL: &str = "info";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time shared checkbox grid over WebSocket.
///
/// Flags left unset fall back to the config file, then to built-in defaults,
/// which is why they are all optional here.
#[derive(Debug, Default, Parser)]
#[command(
    name = "checkbox-server",
    about = "WebSocket server that keeps a shared checkbox grid in sync",
    version
)]
struct Cli {
    /// IP address to bind the listener to.
    #[arg(long, env = "CHECKBOX_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "CHECKBOX_PORT")]
    port: Option<u16>,

    /// Bit store backend: `redis` or `memory`.
    #[arg(long, env = "CHECKBOX_STORE")]
    store: Option<StoreBackend>,

    /// Redis `host:port`.
    #[arg(long, env = "REDIS_ADDR")]
    redis_addr: Option<String>,

    /// Redis password.
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    /// Redis logical database number.
    #[arg(long, env = "REDIS_DB")]
    redis_db: Option<i64>,

    /// Redis key holding the bit vector.
    #[arg(long, env = "CHECKBOX_BITFIELD_KEY")]
    bitfield_key: Option<String>,

    /// Number of checkboxes replayed to each new client.
    #[arg(long, env = "CHECKBOX_COUNT")]
    checkbox_count: Option<u32>,

    /// Encoding for a client until it sends a message: `binary` or `text`.
    #[arg(long, env = "CHECKBOX_WIRE_FORMAT")]
    wire_format: Option<WireFormat>,

    /// Outbound queue capacity per connection.
    #[arg(long, env = "CHECKBOX_OUTBOUND_QUEUE")]
    outbound_queue: Option<usize>,

    /// Maximum time for a single socket write, in milliseconds.
    #[arg(long, env = "CHECKBOX_WRITE_TIMEOUT_MS")]
    write_timeout_ms: Option<u64>,

    /// Path to a TOML config file.
    #[arg(long, env = "CHECKBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file named by `--config`, if any.
    fn load_file(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => config_file::load(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(FileConfig::default()),
        }
    }

    /// Resolves the log level from the CLI, then the file, then `info`.
    fn log_level(&self, file: &FileConfig) -> String {
        self.log_level
            .clone()
            .or_else(|| file.log_level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Merges CLI/env values over `file` over defaults into a validated
    /// [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not an IP address or the
    /// merged configuration fails [`ServerConfig::validate`].
    fn into_server_config(self, file: FileConfig) -> anyhow::Result<ServerConfig> {
        let defaults = ServerConfig::default();
        let store_defaults = StoreConfig::default();

        let bind = self
            .bind
            .or(file.bind)
            .unwrap_or_else(|| defaults.bind_addr.ip().to_string());
        let ip: IpAddr = bind
            .parse()
            .with_context(|| format!("invalid bind address: '{bind}'"))?;
        let port = self.port.or(file.port).unwrap_or(defaults.bind_addr.port());

        let store = StoreConfig {
            backend: self
                .store
                .or(file.store.backend)
                .unwrap_or(store_defaults.backend),
            redis_addr: self
                .redis_addr
                .or(file.store.redis_addr)
                .unwrap_or(store_defaults.redis_addr),
            redis_password: self.redis_password.or(file.store.redis_password),
            redis_db: self
                .redis_db
                .or(file.store.redis_db)
                .unwrap_or(store_defaults.redis_db),
            bitfield_key: self
                .bitfield_key
                .or(file.store.bitfield_key)
                .unwrap_or(store_defaults.bitfield_key),
        };

        let config = ServerConfig {
            bind_addr: SocketAddr::new(ip, port),
            checkbox_count: self
                .checkbox_count
                .or(file.checkbox_count)
                .unwrap_or(defaults.checkbox_count),
            wire_format: self
                .wire_format
                .or(file.wire_format)
                .unwrap_or(defaults.wire_format),
            outbound_queue: self
                .outbound_queue
                .or(file.outbound_queue)
                .unwrap_or(defaults.outbound_queue),
            write_timeout: self
                .write_timeout_ms
                .or(file.write_timeout_ms)
                .map_or(defaults.write_timeout, Duration::from_millis),
            store,
        };

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Parse the CLI and load the optional config file.
/// 2. Initialise `tracing`; `RUST_LOG` wins over `--log-level`.
/// 3. Connect to the bit store.  Failure here is fatal.
/// 4. Install the Ctrl+C handler that clears the shared `running` flag.
/// 5. Serve until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.load_file()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    let level = cli.log_level(&file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    let config = cli.into_server_config(file)?;

    info!(
        "checkbox server starting: bind={}, store={}, checkboxes={}, default_wire={}",
        config.bind_addr, config.store.backend, config.checkbox_count, config.wire_format
    );

    // ── Store ─────────────────────────────────────────────────────────────────
    let store = open_store(&config.store).await.with_context(|| {
        format!(
            "could not connect to {} store at {}",
            config.store.backend, config.store.redis_addr
        )
    })?;

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ───────────────────────────────────────────────────────
    run_server(config, store, running).await?;

    info!("checkbox server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use checkbox_server::infrastructure::config_file::FileStoreConfig;

    #[test]
    fn test_cli_defaults_leave_everything_unset() {
        // Arrange: parse with no arguments
        let cli = Cli::parse_from(["checkbox-server"]);

        // Assert
        assert!(cli.port.is_none());
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["checkbox-server", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_store_parses_backend() {
        let cli = Cli::parse_from(["checkbox-server", "--store", "memory"]);
        assert_eq!(cli.store, Some(StoreBackend::Memory));
    }

    #[test]
    fn test_cli_wire_format_accepts_json_alias() {
        let cli = Cli::parse_from(["checkbox-server", "--wire-format", "json"]);
        assert_eq!(cli.wire_format, Some(WireFormat::Text));
    }

    #[test]
    fn test_cli_rejects_unknown_store() {
        let result = Cli::try_parse_from(["checkbox-server", "--store", "sqlite"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_server_config_defaults_match_domain_defaults() {
        // Arrange
        let cli = Cli::default();

        // Act
        let config = cli.into_server_config(FileConfig::default()).unwrap();

        // Assert
        let defaults = ServerConfig::default();
        assert_eq!(config.bind_addr, defaults.bind_addr);
        assert_eq!(config.checkbox_count, 100);
        assert_eq!(config.wire_format, WireFormat::Text);
        assert_eq!(config.outbound_queue, defaults.outbound_queue);
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_into_server_config_uses_file_when_cli_unset() {
        let file = FileConfig {
            port: Some(9100),
            checkbox_count: Some(500),
            store: FileStoreConfig {
                backend: Some(StoreBackend::Memory),
                bitfield_key: Some("grid".to_string()),
                ..FileStoreConfig::default()
            },
            ..FileConfig::default()
        };

        let config = Cli::default().into_server_config(file).unwrap();

        assert_eq!(config.bind_addr.port(), 9100);
        assert_eq!(config.checkbox_count, 500);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.bitfield_key, "grid");
        assert_eq!(config.store.redis_addr, "localhost:6379");
    }

    #[test]
    fn test_into_server_config_cli_beats_file() {
        let cli = Cli {
            port: Some(7000),
            redis_db: Some(4),
            ..Cli::default()
        };
        let file = FileConfig {
            port: Some(9100),
            store: FileStoreConfig {
                redis_db: Some(1),
                ..FileStoreConfig::default()
            },
            ..FileConfig::default()
        };

        let config = cli.into_server_config(file).unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.store.redis_db, 4);
    }

    #[test]
    fn test_into_server_config_ipv6_bind() {
        let cli = Cli {
            bind: Some("::1".to_string()),
            port: Some(8081),
            ..Cli::default()
        };

        let config = cli.into_server_config(FileConfig::default()).unwrap();

        assert_eq!(config.bind_addr.to_string(), "[::1]:8081");
    }

    #[test]
    fn test_into_server_config_write_timeout_in_millis() {
        let cli = Cli {
            write_timeout_ms: Some(250),
            ..Cli::default()
        };
        let config = cli.into_server_config(FileConfig::default()).unwrap();
        assert_eq!(config.write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_into_server_config_invalid_bind_returns_error() {
        // Arrange: a hostname is not accepted as a bind address
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..Cli::default()
        };

        // Act
        let result = cli.into_server_config(FileConfig::default());

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_into_server_config_rejects_zero_checkboxes() {
        let cli = Cli {
            checkbox_count: Some(0),
            ..Cli::default()
        };
        assert!(cli.into_server_config(FileConfig::default()).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let file = FileConfig {
            log_level: Some("warn".to_string()),
            ..FileConfig::default()
        };

        assert_eq!(Cli::default().log_level(&FileConfig::default()), "info");
        assert_eq!(Cli::default().log_level(&file), "warn");

        let cli = Cli {
            log_level: Some("debug".to_string()),
            ..Cli::default()
        };
        assert_eq!(cli.log_level(&file), "debug");
    }

    #[test]
    fn test_load_file_without_flag_is_empty() {
        let file = Cli::default().load_file().unwrap();
        assert_eq!(file, FileConfig::default());
    }
}

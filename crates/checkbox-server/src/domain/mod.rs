//! Domain layer for checkbox-server.
//!
//! Pure types with no dependencies on I/O, networking, or storage backends.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Connection identity types
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, `WebSocket` or Redis types
//! - File I/O or environment variable reading

pub mod config;
pub mod connection;

pub use config::{ConfigError, ServerConfig, StoreBackend, StoreConfig};
pub use connection::ConnectionId;

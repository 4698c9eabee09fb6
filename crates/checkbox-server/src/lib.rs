//! checkbox-server library crate.
//!
//! A WebSocket server that keeps one shared grid of checkboxes in sync across
//! every connected client, persisting one bit per checkbox in Redis.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Client (binary frames or JSON over WebSocket)
//!         ↕
//! [checkbox-server]
//!   ├── domain/           Pure types: ServerConfig, StoreConfig, ConnectionId
//!   ├── application/      Registry, broadcaster, BitStore trait, session sequencing
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop and per-connection tasks (tokio-tungstenite)
//!         ├── store/      BitStore backends: Redis BITFIELD and in-memory
//!         └── config_file/ Optional TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async, no frameworks).
//! - `application` depends on `domain`, `checkbox-core`, and the `BitStore`
//!   trait it defines; it never touches sockets or Redis directly.
//! - `infrastructure` depends on all other layers plus `tokio`,
//!   `tokio-tungstenite` and `redis`.

/// Domain layer: configuration and identity types (no I/O).
pub mod domain;

/// Application layer: registry, broadcast and session logic.
pub mod application;

/// Infrastructure layer: WebSocket server, store backends, config file.
pub mod infrastructure;

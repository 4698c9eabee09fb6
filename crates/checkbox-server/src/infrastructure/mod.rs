//! Infrastructure layer for checkbox-server.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections,
//! talking to Redis, and reading the optional config file.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Spawning the per-connection writer task and reader loop
//! - Implementing [`BitStore`](crate::application::BitStore) on Redis and in memory
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Deciding what a message means (that is the application layer)
//! - Configuration types (that is the domain layer)

pub mod config_file;
pub mod store;
pub mod ws_server;

pub use store::open_store;
pub use ws_server::{run_server, serve};

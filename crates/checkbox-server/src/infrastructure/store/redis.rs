//! Redis-backed bit store.
//!
//! All checkbox state lives in a single Redis string used as a bit vector.
//! Each checkbox is a 1-bit unsigned field at offset `index`:
//!
//! ```text
//! BITFIELD checkboxes SET u1 7 1    # check box 7
//! BITFIELD checkboxes GET u1 7      # -> [1]
//! ```
//!
//! Redis executes each `BITFIELD` atomically, so concurrent point writes never
//! clobber neighbouring bits.  Reading past the end of the string (or a key
//! that does not exist yet) returns `0`, which gives the default-unchecked
//! behaviour for free.
//!
//! The connection is a [`ConnectionManager`]: a single multiplexed
//! connection that reconnects on its own.  Cloning it is cheap, so every call
//! clones rather than locking.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{IntoConnectionInfo, RedisError};
use tracing::debug;

use crate::application::store::{BitStore, StoreError};
use crate::domain::StoreConfig;

pub struct RedisBitStore {
    conn: ConnectionManager,
    key: String,
}

fn backend_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

impl RedisBitStore {
    /// Connects to the Redis server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the address is invalid or the
    /// initial connection fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut info = format!("redis://{}/", config.redis_addr)
            .into_connection_info()
            .map_err(|e| {
                StoreError::Unavailable(format!("invalid Redis address '{}': {e}", config.redis_addr))
            })?;
        info.redis.db = config.redis_db;
        info.redis.password = config.redis_password.clone();

        let client = redis::Client::open(info).map_err(backend_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", config.redis_addr)))?;

        debug!("Redis connection to {} established", config.redis_addr);
        Ok(Self {
            conn,
            key: config.bitfield_key.clone(),
        })
    }

    /// Name of the key holding the bit vector.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl BitStore for RedisBitStore {
    async fn set(&self, index: u32, value: bool) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _previous: Vec<i64> = redis::cmd("BITFIELD")
            .arg(&self.key)
            .arg("SET")
            .arg("u1")
            .arg(index)
            .arg(u8::from(value))
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn get(&self, index: u32) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let values: Vec<i64> = redis::cmd("BITFIELD")
            .arg(&self.key)
            .arg("GET")
            .arg("u1")
            .arg(index)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        // An empty reply means nothing was ever written there.
        Ok(values.first().is_some_and(|v| *v == 1))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

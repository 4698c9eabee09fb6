//! Bit store backends.
//!
//! - [`RedisBitStore`]: production backend, one Redis key used as a bit vector
//!   through `BITFIELD ... u1 <index>`.
//! - [`MemoryBitStore`]: process-local backend for tests and `--store memory`.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use tracing::info;

use crate::application::store::{BitStore, StoreError};
use crate::domain::{StoreBackend, StoreConfig};

pub use memory::MemoryBitStore;
pub use self::redis::RedisBitStore;

/// Opens the backend selected by `config` and checks it is reachable.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
/// This is the one store failure the server treats as fatal.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BitStore>, StoreError> {
    let store: Arc<dyn BitStore> = match config.backend {
        StoreBackend::Redis => Arc::new(RedisBitStore::connect(config).await?),
        StoreBackend::Memory => Arc::new(MemoryBitStore::new()),
    };

    store.ping().await?;
    info!("connected to {} store", config.backend);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store_pings() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };

        let store = open_store(&config).await.unwrap();

        assert_eq!(store.get(0).await, Ok(false));
    }
}

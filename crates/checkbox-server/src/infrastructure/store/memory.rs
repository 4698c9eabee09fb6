//! In-memory bit store.
//!
//! Bits are packed eight to a byte in the same order Redis uses for string
//! bit offsets: bit `i` is bit `7 - i % 8` of byte `i / 8`.  The vector grows
//! on demand, so a write to index 1 000 000 allocates ~125 KB.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::application::store::{BitStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryBitStore {
    bytes: RwLock<Vec<u8>>,
}

impl MemoryBitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of set bits.
    pub fn count_checked(&self) -> usize {
        self.bytes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }
}

fn locate(index: u32) -> (usize, u8) {
    ((index / 8) as usize, 0x80 >> (index % 8))
}

#[async_trait]
impl BitStore for MemoryBitStore {
    async fn set(&self, index: u32, value: bool) -> Result<(), StoreError> {
        let (byte, mask) = locate(index);
        let mut bytes = self.bytes.write().unwrap_or_else(PoisonError::into_inner);

        if byte >= bytes.len() {
            if !value {
                return Ok(());
            }
            bytes.resize(byte + 1, 0);
        }
        if value {
            bytes[byte] |= mask;
        } else {
            bytes[byte] &= !mask;
        }
        Ok(())
    }

    async fn get(&self, index: u32) -> Result<bool, StoreError> {
        let (byte, mask) = locate(index);
        let bytes = self.bytes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(bytes.get(byte).is_some_and(|b| b & mask != 0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

//! Store abstraction used by the runner.
//!
//! The source side only exposes reads, so the runner cannot mutate it.
//! - `RedisStore` - one async connection to a live instance
//! - `MemoryStore` - in-process stand-in for tests

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::{errors::SyncError, record::KeyRecord};

/// Read-only view of the store keys are copied from.
#[allow(async_fn_in_trait)]
pub trait SourceStore {
    /// One step of a cursor-based scan. A returned cursor of `0` ends the scan.
    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<Vec<u8>>), SyncError>;

    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError>;

    /// Read type, value and TTL of a key.
    ///
    /// Returns `Ok(None)` when the key no longer exists and
    /// `SyncError::UnsupportedType` when its type cannot be copied.
    async fn read(&mut self, key: &[u8]) -> Result<Option<KeyRecord>, SyncError>;
}

/// Store keys are copied into.
#[allow(async_fn_in_trait)]
pub trait TargetStore {
    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError>;

    /// Replace the key with the record, atomically with respect to other clients.
    async fn write(&mut self, record: &KeyRecord) -> Result<(), SyncError>;
}

//! Durable key-value storage
//!
//! The backing store only offers independent get/set/delete. Anything that
//! needs read-modify-write on a collection goes through the single-writer
//! actors in `location::queue` and `queue`.

pub mod engine;
pub mod memory;

pub use engine::RocksStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SyncError, SyncResult};

/// Captured GPS samples awaiting hand-off
pub const LOCATION_QUEUE_KEY: &str = "location-queue";
/// Timestamp of the last sample that reached a consumer or the queue
pub const LAST_LOCATION_TIMESTAMP_KEY: &str = "last-location-timestamp";
/// Liveness timestamp written on every capture task invocation
pub const HEARTBEAT_KEY: &str = "heartbeat";
/// Pending mutations awaiting sync
pub const OFFLINE_ACTION_QUEUE_KEY: &str = "offline-action-queue";
/// Prefix for per-entity cache snapshots (`cache:rides`, ...)
pub const CACHE_KEY_PREFIX: &str = "cache:";

/// Primitive key-value store. No operation is atomic with respect to another.
pub trait DurableStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> SyncResult<()>;

    fn delete(&self, key: &str) -> SyncResult<()>;
}

/// Load and decode a JSON value. Corrupt bytes are reported as an error.
pub fn load_json<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> SyncResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::CorruptCollection(key.to_string(), e.to_string())),
        None => Ok(None),
    }
}

/// Load a collection, treating a missing, unreadable or corrupt entry as empty.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn DurableStore, key: &str) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!("Treating '{}' as empty: {}", key, e);
            T::default()
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn DurableStore, key: &str, value: &T) -> SyncResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes)
}

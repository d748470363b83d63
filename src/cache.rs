//! Per-entity snapshots used as the read path when offline
//!
//! Each entity type lives under `cache:<entity>` as one JSON document.
//! Merges are last-write-wins by the entity's `id` field.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::error::ActionError;
use crate::storage::{self, DurableStore, CACHE_KEY_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Rides,
    Groups,
    Vehicles,
    Posts,
    Challenges,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Rides,
        EntityKind::Groups,
        EntityKind::Vehicles,
        EntityKind::Posts,
        EntityKind::Challenges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Rides => "rides",
            EntityKind::Groups => "groups",
            EntityKind::Vehicles => "vehicles",
            EntityKind::Posts => "posts",
            EntityKind::Challenges => "challenges",
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    items: Vec<JsonValue>,
}

impl Snapshot {
    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| entity_id(item) == Some(id))
    }

    /// Returns false when the item has no string `id`
    fn merge_one(&mut self, item: JsonValue) -> bool {
        let Some(id) = entity_id(&item).map(str::to_owned) else {
            return false;
        };
        match self.position(&id) {
            Some(idx) => self.items[idx] = item,
            None => self.items.push(item),
        }
        true
    }
}

fn entity_id(item: &JsonValue) -> Option<&str> {
    item.get("id").and_then(JsonValue::as_str)
}

/// Result of [`LocalCacheStore::read_through`]
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRead {
    pub items: Vec<JsonValue>,
    /// True when the backend was not consulted or failed
    pub from_cache: bool,
}

pub struct LocalCacheStore {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write on every cache key
    write_lock: Mutex<()>,
}

impl LocalCacheStore {
    pub fn new(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn list(&self, kind: EntityKind) -> Vec<JsonValue> {
        self.load(kind).items
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<JsonValue> {
        let snapshot = self.load(kind);
        snapshot.position(id).map(|idx| snapshot.items[idx].clone())
    }

    /// When the snapshot for `kind` was last written, if ever
    pub fn last_updated(&self, kind: EntityKind) -> Option<i64> {
        self.load(kind).updated_at
    }

    /// Insert or replace a single entity
    pub fn upsert(&self, kind: EntityKind, item: JsonValue) -> bool {
        self.merge(kind, vec![item]) == 1
    }

    /// Last-write-wins merge keyed by `id`. Existing entities are replaced in
    /// place, new ones appended. Items without an id are skipped. Returns the
    /// number merged.
    pub fn merge(&self, kind: EntityKind, items: Vec<JsonValue>) -> usize {
        let _guard = self.write_lock.lock();
        let mut snapshot = self.load(kind);

        let mut merged = 0;
        for item in items {
            if snapshot.merge_one(item) {
                merged += 1;
            } else {
                warn!("Skipping {} cache entry without an id", kind);
            }
        }
        if merged == 0 {
            return 0;
        }

        if self.save(kind, &mut snapshot) {
            merged
        } else {
            0
        }
    }

    pub fn remove(&self, kind: EntityKind, id: &str) -> bool {
        let _guard = self.write_lock.lock();
        let mut snapshot = self.load(kind);

        let Some(idx) = snapshot.position(id) else {
            return false;
        };
        snapshot.items.remove(idx);
        self.save(kind, &mut snapshot)
    }

    /// Overwrite the whole snapshot, e.g. after a full list fetch
    pub fn replace(&self, kind: EntityKind, items: Vec<JsonValue>) -> bool {
        let _guard = self.write_lock.lock();
        let mut snapshot = Snapshot::default();
        for item in items {
            if !snapshot.merge_one(item) {
                warn!("Skipping {} cache entry without an id", kind);
            }
        }
        self.save(kind, &mut snapshot)
    }

    pub fn clear(&self, kind: EntityKind) -> bool {
        let _guard = self.write_lock.lock();
        match self.store.delete(&kind.storage_key()) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to clear {} cache: {}", kind, e);
                false
            }
        }
    }

    /// Fetch from the backend when online, merging the result into the cache.
    /// Falls back to the cached snapshot when offline, on error, or when the
    /// fetch exceeds `timeout`.
    pub async fn read_through<F, Fut>(
        &self,
        kind: EntityKind,
        online: bool,
        timeout: Duration,
        fetch: F,
    ) -> CachedRead
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<JsonValue>, ActionError>>,
    {
        if online {
            match tokio::time::timeout(timeout, fetch()).await {
                Ok(Ok(items)) => {
                    self.merge(kind, items.clone());
                    return CachedRead {
                        items,
                        from_cache: false,
                    };
                }
                Ok(Err(e)) => warn!("Remote read of {} failed, serving cache: {}", kind, e),
                Err(_) => warn!("Remote read of {} timed out after {:?}, serving cache", kind, timeout),
            }
        } else {
            debug!("Offline, serving {} from cache", kind);
        }

        CachedRead {
            items: self.list(kind),
            from_cache: true,
        }
    }

    fn load(&self, kind: EntityKind) -> Snapshot {
        storage::load_or_default(self.store.as_ref(), &kind.storage_key())
    }

    fn save(&self, kind: EntityKind, snapshot: &mut Snapshot) -> bool {
        snapshot.updated_at = Some(self.clock.now_millis());
        match storage::save_json(self.store.as_ref(), &kind.storage_key(), &*snapshot) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write {} cache: {}", kind, e);
                false
            }
        }
    }
}

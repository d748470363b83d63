//! Bounded durable queue of captured samples
//!
//! One actor task owns the working copy and is the only writer of
//! `location-queue`. Handles are cheap clones of the command sender.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::types::LocationSample;
use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::storage::{self, DurableStore, LOCATION_QUEUE_KEY};

/// Default bound on persisted samples
pub const MAX_PERSISTED_LOCATIONS: usize = 2000;

const ACTOR_NAME: &str = "location-queue";

enum LocationCommand {
    Append {
        sample: LocationSample,
        reply: oneshot::Sender<SyncResult<usize>>,
    },
    ReadAll {
        reply: oneshot::Sender<Vec<LocationSample>>,
    },
    TakeAll {
        reply: oneshot::Sender<SyncResult<Vec<LocationSample>>>,
    },
    Clear {
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the location queue actor
#[derive(Clone)]
pub struct LocationQueue {
    tx: mpsc::Sender<LocationCommand>,
    max_size: usize,
}

impl LocationQueue {
    /// Load the persisted queue and start its actor on the current runtime
    pub fn spawn(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        let mut items: VecDeque<LocationSample> = storage::load_or_default(store.as_ref(), LOCATION_QUEUE_KEY);
        if items.len() > max_size {
            let excess = items.len() - max_size;
            items.drain(..excess);
        }
        debug!("Location queue loaded with {} samples", items.len());

        let (tx, rx) = mpsc::channel(256);
        let actor = LocationQueueActor {
            store,
            clock,
            items,
            max_size,
        };
        tokio::spawn(actor.run(rx));

        Self { tx, max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Stamp and persist a sample. Returns false if it could not be persisted.
    pub async fn append(&self, sample: LocationSample) -> bool {
        match self.request(|reply| LocationCommand::Append { sample, reply }).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) | Err(e) => {
                error!("Failed to persist location sample: {}", e);
                false
            }
        }
    }

    /// Snapshot of the queue, oldest first
    pub async fn read_all(&self) -> Vec<LocationSample> {
        self.request(|reply| LocationCommand::ReadAll { reply })
            .await
            .unwrap_or_else(|e| {
                warn!("{}", e);
                Vec::new()
            })
    }

    /// Snapshot and clear in one step, for a consumer catching up after a gap.
    /// Nothing appended concurrently can slip between the read and the clear.
    pub async fn take_all(&self) -> Vec<LocationSample> {
        match self.request(|reply| LocationCommand::TakeAll { reply }).await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) | Err(e) => {
                error!("Failed to take location queue: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn clear(&self) -> bool {
        match self.request(|reply| LocationCommand::Clear { reply }).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) | Err(e) => {
                error!("Failed to clear location queue: {}", e);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.request(|reply| LocationCommand::Len { reply })
            .await
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LocationCommand,
    ) -> SyncResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SyncError::ActorClosed(ACTOR_NAME))?;
        rx.await.map_err(|_| SyncError::ActorClosed(ACTOR_NAME))
    }
}

struct LocationQueueActor {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    items: VecDeque<LocationSample>,
    max_size: usize,
}

impl LocationQueueActor {
    async fn run(mut self, mut rx: mpsc::Receiver<LocationCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                LocationCommand::Append { sample, reply } => {
                    let _ = reply.send(self.append(sample));
                }
                LocationCommand::ReadAll { reply } => {
                    let _ = reply.send(self.items.iter().copied().collect());
                }
                LocationCommand::TakeAll { reply } => {
                    let result = self
                        .store
                        .delete(LOCATION_QUEUE_KEY)
                        .map(|_| self.items.drain(..).collect());
                    let _ = reply.send(result);
                }
                LocationCommand::Clear { reply } => {
                    let result = self.store.delete(LOCATION_QUEUE_KEY).map(|_| self.items.clear());
                    let _ = reply.send(result);
                }
                LocationCommand::Len { reply } => {
                    let _ = reply.send(self.items.len());
                }
            }
        }
        debug!("Location queue actor stopped");
    }

    fn append(&mut self, sample: LocationSample) -> SyncResult<usize> {
        self.items.push_back(sample.stamped(self.clock.now_millis()));

        // Oldest samples go first; the producer is not told
        let mut evicted = Vec::new();
        while self.items.len() > self.max_size {
            evicted.extend(self.items.pop_front());
        }

        if let Err(e) = storage::save_json(self.store.as_ref(), LOCATION_QUEUE_KEY, &self.items) {
            // Keep memory in step with disk
            self.items.pop_back();
            for sample in evicted.into_iter().rev() {
                self.items.push_front(sample);
            }
            return Err(e);
        }
        if !evicted.is_empty() {
            debug!("Location queue full, dropped {} oldest samples", evicted.len());
        }
        Ok(self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched off
    #[derive(Debug, Default)]
    struct ReadOnlyAfter {
        inner: MemoryStore,
        locked: AtomicBool,
    }

    impl DurableStore for ReadOnlyAfter {
        fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> SyncResult<()> {
            if self.locked.load(Ordering::SeqCst) {
                return Err(SyncError::StorageError("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> SyncResult<()> {
            self.inner.delete(key)
        }
    }

    fn sample(ts: i64) -> LocationSample {
        LocationSample {
            latitude: 48.85,
            longitude: 2.35,
            accuracy: Some(4.0),
            speed: None,
            heading: None,
            timestamp: ts,
            processed_at: None,
        }
    }

    #[tokio::test]
    async fn test_append_stamps_processed_at() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(5_000));
        let queue = LocationQueue::spawn(store, clock, 10);

        assert!(queue.append(sample(1)).await);
        let items = queue.read_all().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].processed_at, Some(5_000));
        assert_eq!(items[0].timestamp, 1);
    }

    #[tokio::test]
    async fn test_bound_drops_oldest() {
        let store = Arc::new(MemoryStore::new());
        let queue = LocationQueue::spawn(store, Arc::new(ManualClock::new(0)), 3);

        for ts in 0..5 {
            assert!(queue.append(sample(ts)).await);
        }
        let stamps: Vec<i64> = queue.read_all().await.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_corrupt_store_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(LOCATION_QUEUE_KEY, b"not json at all").unwrap();

        let queue = LocationQueue::spawn(store.clone(), Arc::new(ManualClock::new(0)), 10);
        assert!(queue.is_empty().await);

        // Next append overwrites the corrupt value
        assert!(queue.append(sample(7)).await);
        let persisted: Vec<LocationSample> = storage::load_json(store.as_ref(), LOCATION_QUEUE_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_take_all_clears() {
        let store = Arc::new(MemoryStore::new());
        let queue = LocationQueue::spawn(store.clone(), Arc::new(ManualClock::new(0)), 10);
        queue.append(sample(1)).await;
        queue.append(sample(2)).await;

        let taken = queue.take_all().await;
        assert_eq!(taken.len(), 2);
        assert!(queue.is_empty().await);
        assert_eq!(store.get(LOCATION_QUEUE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_queue_unchanged() {
        let store = Arc::new(ReadOnlyAfter::default());
        let queue = LocationQueue::spawn(store.clone(), Arc::new(ManualClock::new(0)), 2);
        assert!(queue.append(sample(1)).await);
        assert!(queue.append(sample(2)).await);

        store.locked.store(true, Ordering::SeqCst);
        assert!(!queue.append(sample(3)).await);
        let stamps: Vec<i64> = queue.read_all().await.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![1, 2]);

        // The rejected sample must not ride along with the next write
        store.locked.store(false, Ordering::SeqCst);
        assert!(queue.append(sample(4)).await);
        let persisted: Vec<LocationSample> = storage::load_json(store.as_ref(), LOCATION_QUEUE_KEY)
            .unwrap()
            .unwrap();
        let stamps: Vec<i64> = persisted.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![2, 4]);
    }
}

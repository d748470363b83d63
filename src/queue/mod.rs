//! Durable FIFO of pending mutations
//!
//! Like the location queue, a single actor owns `offline-action-queue`.
//! The sync engine never writes the collection directly: it reports what
//! happened to each action it processed and the actor folds that into the
//! current list, so actions enqueued during a drain are kept.

pub mod types;

pub use types::{ActionType, OfflineAction};

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::storage::{self, DurableStore, OFFLINE_ACTION_QUEUE_KEY};

const ACTOR_NAME: &str = "offline-action-queue";

/// What a drain pass decided for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Synced or given up; drop it
    Remove,
    /// Keep for the next pass with the new retry count
    Retry { retry_count: u32 },
}

enum QueueCommand {
    Enqueue {
        action_type: ActionType,
        payload: JsonValue,
        reply: oneshot::Sender<SyncResult<OfflineAction>>,
    },
    Push {
        action: OfflineAction,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<OfflineAction>>,
    },
    Apply {
        outcomes: HashMap<String, ActionOutcome>,
        reply: oneshot::Sender<SyncResult<usize>>,
    },
    Clear {
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the offline action queue actor
#[derive(Clone)]
pub struct OfflineActionQueue {
    tx: mpsc::Sender<QueueCommand>,
}

impl OfflineActionQueue {
    /// Load the persisted queue and start its actor on the current runtime
    pub fn spawn(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        let items: Vec<OfflineAction> = storage::load_or_default(store.as_ref(), OFFLINE_ACTION_QUEUE_KEY);
        if !items.is_empty() {
            info!("Loaded {} pending offline actions", items.len());
        }

        let (tx, rx) = mpsc::channel(256);
        let actor = QueueActor { store, clock, items };
        tokio::spawn(actor.run(rx));

        Self { tx }
    }

    /// Append and persist a new action. None if it could not be persisted.
    pub async fn enqueue(&self, action_type: ActionType, payload: JsonValue) -> Option<OfflineAction> {
        let result = self
            .request(|reply| QueueCommand::Enqueue {
                action_type,
                payload,
                reply,
            })
            .await;
        match result {
            Ok(Ok(action)) => Some(action),
            Ok(Err(e)) | Err(e) => {
                error!("Failed to enqueue {} action: {}", action_type, e);
                None
            }
        }
    }

    /// Append an action built by the caller, keeping its id and timestamp
    pub async fn push(&self, action: OfflineAction) -> bool {
        let action_type = action.action_type;
        match self.request(|reply| QueueCommand::Push { action, reply }).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) | Err(e) => {
                error!("Failed to enqueue {} action: {}", action_type, e);
                false
            }
        }
    }

    /// Current actions in enqueue order
    pub async fn snapshot(&self) -> Vec<OfflineAction> {
        self.request(|reply| QueueCommand::Snapshot { reply })
            .await
            .unwrap_or_default()
    }

    /// Fold the outcome of a drain pass into the queue and persist it.
    /// Actions without an outcome are kept untouched. Returns the new length.
    pub async fn apply_outcomes(&self, outcomes: HashMap<String, ActionOutcome>) -> SyncResult<usize> {
        self.request(|reply| QueueCommand::Apply { outcomes, reply }).await?
    }

    pub async fn clear(&self) -> bool {
        match self.request(|reply| QueueCommand::Clear { reply }).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) | Err(e) => {
                error!("Failed to clear offline action queue: {}", e);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.request(|reply| QueueCommand::Len { reply })
            .await
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> QueueCommand) -> SyncResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SyncError::ActorClosed(ACTOR_NAME))?;
        rx.await.map_err(|_| SyncError::ActorClosed(ACTOR_NAME))
    }
}

struct QueueActor {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    items: Vec<OfflineAction>,
}

impl QueueActor {
    async fn run(mut self, mut rx: mpsc::Receiver<QueueCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                QueueCommand::Enqueue {
                    action_type,
                    payload,
                    reply,
                } => {
                    let action = OfflineAction::new(action_type, payload, self.clock.now_millis());
                    let _ = reply.send(self.push(action.clone()).map(|_| action));
                }
                QueueCommand::Push { action, reply } => {
                    let _ = reply.send(self.push(action));
                }
                QueueCommand::Snapshot { reply } => {
                    let _ = reply.send(self.items.clone());
                }
                QueueCommand::Apply { outcomes, reply } => {
                    let _ = reply.send(self.apply(outcomes));
                }
                QueueCommand::Clear { reply } => {
                    let result = self.store.delete(OFFLINE_ACTION_QUEUE_KEY).map(|_| self.items.clear());
                    let _ = reply.send(result);
                }
                QueueCommand::Len { reply } => {
                    let _ = reply.send(self.items.len());
                }
            }
        }
        debug!("Offline action queue actor stopped");
    }

    fn push(&mut self, action: OfflineAction) -> SyncResult<()> {
        let (action_type, id) = (action.action_type, action.id.clone());
        self.items.push(action);

        if let Err(e) = self.persist() {
            self.items.pop();
            return Err(e);
        }
        debug!("Queued {} action {} ({} pending)", action_type, id, self.items.len());
        Ok(())
    }

    fn apply(&mut self, outcomes: HashMap<String, ActionOutcome>) -> SyncResult<usize> {
        let previous = self.items.clone();

        self.items.retain_mut(|action| match outcomes.get(&action.id) {
            Some(ActionOutcome::Remove) => false,
            Some(ActionOutcome::Retry { retry_count }) => {
                action.retry_count = *retry_count;
                true
            }
            None => true,
        });

        if let Err(e) = self.persist() {
            self.items = previous;
            return Err(e);
        }
        Ok(self.items.len())
    }

    fn persist(&self) -> SyncResult<()> {
        storage::save_json(self.store.as_ref(), OFFLINE_ACTION_QUEUE_KEY, &self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn spawn_queue() -> (OfflineActionQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let queue = OfflineActionQueue::spawn(store.clone(), Arc::new(ManualClock::new(42)));
        (queue, store)
    }

    #[tokio::test]
    async fn test_enqueue_persists_with_zero_retries() {
        let (queue, store) = spawn_queue();
        let action = queue
            .enqueue(ActionType::CreateRide, json!({"id": "r1"}))
            .await
            .unwrap();
        assert_eq!(action.retry_count, 0);
        assert_eq!(action.enqueued_at, 42);

        let persisted: Vec<OfflineAction> = storage::load_json(store.as_ref(), OFFLINE_ACTION_QUEUE_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(persisted, vec![action]);
    }

    #[tokio::test]
    async fn test_apply_keeps_unknown_actions() {
        let (queue, _store) = spawn_queue();
        let first = queue.enqueue(ActionType::CreateGroup, json!({"id": "g1"})).await.unwrap();
        let second = queue.enqueue(ActionType::JoinGroup, json!({"group_id": "g1"})).await.unwrap();
        let late = queue.enqueue(ActionType::CreatePost, json!({"id": "p1"})).await.unwrap();

        let mut outcomes = HashMap::new();
        outcomes.insert(first.id.clone(), ActionOutcome::Remove);
        outcomes.insert(second.id.clone(), ActionOutcome::Retry { retry_count: 1 });

        assert_eq!(queue.apply_outcomes(outcomes).await.unwrap(), 2);
        let remaining = queue.snapshot().await;
        assert_eq!(remaining[0].id, second.id);
        assert_eq!(remaining[0].retry_count, 1);
        assert_eq!(remaining[1].id, late.id);
        assert_eq!(remaining[1].retry_count, 0);
    }

    #[tokio::test]
    async fn test_reload_after_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let queue = OfflineActionQueue::spawn(store.clone(), Arc::new(ManualClock::new(0)));
            queue.enqueue(ActionType::UpdateRide, json!({"id": "r1"})).await.unwrap();
        }

        let queue = OfflineActionQueue::spawn(store, Arc::new(ManualClock::new(0)));
        let items = queue.snapshot().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action_type, ActionType::UpdateRide);
    }

    #[tokio::test]
    async fn test_corrupt_queue_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(OFFLINE_ACTION_QUEUE_KEY, b"{\"truncated\":").unwrap();

        let queue = OfflineActionQueue::spawn(store, Arc::new(ManualClock::new(0)));
        assert!(queue.is_empty().await);
    }
}

//! Common test utilities
//!
//! Provides shared helpers for:
//! - A scriptable in-memory remote API that records every call
//! - Sync engine harnesses on memory or RocksDB stores
//! - Location sample fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ridesync::clock::ManualClock;
use ridesync::error::ActionError;
use ridesync::location::RawSample;
use ridesync::queue::{ActionType, OfflineActionQueue};
use ridesync::storage::{DurableStore, MemoryStore};
use ridesync::sync::{RemoteApi, RemoteResult, SyncConfig, SyncEngine};
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action_type: ActionType,
    pub payload: JsonValue,
    pub idempotency_key: Option<String>,
}

/// Remote API double. Succeeds by default; failures can be scripted per
/// action type, and calls can be held at a gate to simulate a slow backend.
#[derive(Default)]
pub struct MockApi {
    reachable: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
    scripted: Mutex<HashMap<ActionType, VecDeque<ActionError>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.reachable.store(true, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// The next `times` calls for `action_type` fail with `error`
    pub fn fail(&self, action_type: ActionType, error: ActionError, times: usize) {
        let mut scripted = self.scripted.lock();
        let queue = scripted.entry(action_type).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Block every call until [`release`](Self::release)
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(1_000);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_types(&self) -> Vec<ActionType> {
        self.calls.lock().iter().map(|c| c.action_type).collect()
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn call(&self, action_type: ActionType, payload: &JsonValue, idempotency_key: Option<&str>) -> RemoteResult {
        self.calls.lock().push(RecordedCall {
            action_type,
            payload: payload.clone(),
            idempotency_key: idempotency_key.map(str::to_owned),
        });

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        let scripted = self
            .scripted
            .lock()
            .get_mut(&action_type)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(json!({"ok": true})),
        }
    }

    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub store: Arc<dyn DurableStore>,
    pub clock: Arc<ManualClock>,
    pub api: Arc<MockApi>,
    pub engine: Arc<SyncEngine>,
    pub online: watch::Sender<bool>,
}

impl Harness {
    pub fn new(online: bool) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), online)
    }

    pub fn with_store(store: Arc<dyn DurableStore>, online: bool) -> Self {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let api = MockApi::new();
        let queue = OfflineActionQueue::spawn(store.clone(), clock.clone());
        let (tx, rx) = watch::channel(online);
        let engine = Arc::new(SyncEngine::new(queue, api.clone(), clock.clone(), rx, SyncConfig::default()));
        Self {
            store,
            clock,
            api,
            engine,
            online: tx,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    pub async fn queue_size(&self) -> usize {
        self.engine.queue().len().await
    }
}

/// Poll `cond` until it holds or a second passes
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 1s");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub fn raw_sample(i: usize) -> RawSample {
    RawSample {
        latitude: 45.0 + i as f64 * 0.0001,
        longitude: 7.0 + i as f64 * 0.0001,
        accuracy: Some(4.0),
        speed: Some(8.5),
        heading: Some(90.0),
        timestamp: 1_700_000_000_000 + i as i64 * 333,
    }
}

//! Drains the offline action queue against the remote API
//!
//! Handles:
//! - FIFO dispatch of pending actions to their per-type handler
//! - Retry with a give-up threshold for transient failures
//! - Immediate drop of permanent or corrupt actions
//! - Coalescing of drain requests that arrive mid-drain

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::remote::{dispatch, RemoteApi, RemoteResult};
use super::state::{DrainOutcome, DrainReport, SyncEvent, SyncState};
use crate::clock::Clock;
use crate::connectivity::ConnectivityListener;
use crate::error::ActionError;
use crate::queue::{ActionOutcome, ActionType, OfflineAction, OfflineActionQueue};

/// Default number of failed attempts before an action is discarded
pub const GIVE_UP_THRESHOLD: u32 = 3;

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts before a transiently failing action is dropped
    pub give_up_threshold: u32,
    /// Upper bound on a single remote call
    pub remote_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            give_up_threshold: GIVE_UP_THRESHOLD,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// What happened to a mutation handed to [`SyncEngine::submit`]
#[derive(Debug, Clone)]
pub enum Submission {
    /// The backend accepted it
    Delivered(JsonValue),
    /// Not sent yet; it goes out with the next drain
    Queued(OfflineAction),
    /// The backend refused it; retrying cannot help
    Rejected(ActionError),
    /// Could not be delivered nor persisted
    Unsaved(OfflineAction),
}

pub struct SyncEngine {
    queue: OfflineActionQueue,
    api: Arc<dyn RemoteApi>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    online: watch::Receiver<bool>,
    syncing: AtomicBool,
    follow_up: AtomicBool,
    lost: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        queue: OfflineActionQueue,
        api: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
        online: watch::Receiver<bool>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            queue,
            api,
            clock,
            config,
            online,
            syncing: AtomicBool::new(false),
            follow_up: AtomicBool::new(false),
            lost: AtomicU64::new(0),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn queue(&self) -> &OfflineActionQueue {
        &self.queue
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> SyncState {
        SyncState {
            is_online: self.is_online(),
            is_syncing: self.is_syncing(),
            queue_size: self.queue.len().await,
            lost_actions: self.lost.load(Ordering::SeqCst),
        }
    }

    pub async fn enqueue(&self, action_type: ActionType, payload: JsonValue) -> Option<OfflineAction> {
        self.queue.enqueue(action_type, payload).await
    }

    /// Call-site helper for a mutation: try the backend when online, queue it
    /// when offline or on a transient failure. While older actions are still
    /// pending it goes behind them, so a later mutation never overtakes an
    /// earlier one.
    pub async fn submit(&self, action_type: ActionType, payload: JsonValue) -> Submission {
        let action = OfflineAction::new(action_type, payload, self.clock.now_millis());

        let pending = self.queue.len().await;
        if pending > 0 {
            debug!("{} queued behind {} pending actions", action_type, pending);
        } else if self.is_online() {
            match self.call_remote(&action).await {
                Ok(result) => return Submission::Delivered(result),
                Err(e) if !e.is_retryable() => {
                    warn!("{} rejected by backend: {}", action_type, e);
                    return Submission::Rejected(e);
                }
                Err(e) => {
                    info!("{} failed ({}), queueing for later", action_type, e);
                }
            }
        }

        if self.queue.push(action.clone()).await {
            Submission::Queued(action)
        } else {
            Submission::Unsaved(action)
        }
    }

    /// Attempt every queued action once. Not re-entrant: a call made while a
    /// drain is running only asks that drain for one more pass.
    pub async fn drain(&self) -> DrainOutcome {
        if !self.is_online() {
            debug!("Skipping drain while offline");
            return DrainOutcome::Offline;
        }

        let mut report = DrainReport::default();
        let mut first = true;
        loop {
            if self
                .syncing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                self.follow_up.store(true, Ordering::SeqCst);
                if first {
                    debug!("Drain already in progress, coalescing request");
                    return DrainOutcome::AlreadySyncing;
                }
                // Another caller took over between our passes and owns the request now
                break;
            }
            first = false;

            loop {
                self.follow_up.store(false, Ordering::SeqCst);
                report.absorb(self.drain_pass().await);
                if !self.follow_up.load(Ordering::SeqCst) || !self.is_online() {
                    break;
                }
                debug!("Running follow-up drain pass");
            }

            self.syncing.store(false, Ordering::SeqCst);

            // A request may have landed after the last check but before the flag cleared
            if !(self.follow_up.load(Ordering::SeqCst) && self.is_online()) {
                break;
            }
        }

        let _ = self.events.send(SyncEvent::DrainFinished(report.clone()));
        DrainOutcome::Completed(report)
    }

    async fn drain_pass(&self) -> DrainReport {
        let snapshot = self.queue.snapshot().await;
        let mut report = DrainReport {
            passes: 1,
            remaining: snapshot.len(),
            ..Default::default()
        };
        if snapshot.is_empty() {
            return report;
        }

        info!("Draining {} offline actions", snapshot.len());
        let _ = self.events.send(SyncEvent::DrainStarted { pending: snapshot.len() });

        let mut outcomes = HashMap::with_capacity(snapshot.len());
        for action in snapshot {
            if !self.is_online() {
                info!("Connection lost mid-drain, leaving remaining actions queued");
                break;
            }

            match self.call_remote(&action).await {
                Ok(_) => {
                    debug!("Synced {} action {}", action.action_type, action.id);
                    outcomes.insert(action.id.clone(), ActionOutcome::Remove);
                    report.synced += 1;
                    let _ = self.events.send(SyncEvent::ActionSynced { id: action.id });
                }
                Err(e) => {
                    let outcome = self.on_failure(action, e, &mut report);
                    outcomes.insert(outcome.0, outcome.1);
                }
            }
        }

        match self.queue.apply_outcomes(outcomes).await {
            Ok(remaining) => report.remaining = remaining,
            Err(e) => {
                // Nothing was rewritten; the same actions come back next pass
                error!("Failed to persist drain results: {}", e);
                report.remaining = self.queue.len().await;
            }
        }

        info!(
            "Drain pass done: {} synced, {} retrying, {} lost, {} remaining",
            report.synced, report.retried, report.lost, report.remaining
        );
        report
    }

    fn on_failure(&self, action: OfflineAction, error: ActionError, report: &mut DrainReport) -> (String, ActionOutcome) {
        if error.is_retryable() {
            let retry_count = action.retry_count + 1;
            if retry_count < self.config.give_up_threshold {
                warn!(
                    "{} action {} failed (attempt {}/{}): {}",
                    action.action_type, action.id, retry_count, self.config.give_up_threshold, error
                );
                report.retried += 1;
                let _ = self.events.send(SyncEvent::ActionRetrying {
                    id: action.id.clone(),
                    retry_count,
                    error,
                });
                return (action.id, ActionOutcome::Retry { retry_count });
            }
        }

        error!(
            "Giving up on {} action {} after {} attempts: {}",
            action.action_type,
            action.id,
            action.retry_count + 1,
            error
        );
        report.lost += 1;
        self.lost.fetch_add(1, Ordering::SeqCst);
        let id = action.id.clone();
        let _ = self.events.send(SyncEvent::ActionLost { action, error });
        (id, ActionOutcome::Remove)
    }

    async fn call_remote(&self, action: &OfflineAction) -> RemoteResult {
        match tokio::time::timeout(self.config.remote_timeout, dispatch(self.api.as_ref(), action)).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::Transient(format!(
                "{} timed out after {:?}",
                action.action_type, self.config.remote_timeout
            ))),
        }
    }
}

#[async_trait]
impl ConnectivityListener for SyncEngine {
    async fn on_reconnect(&self) {
        match self.drain().await {
            DrainOutcome::Completed(report) => {
                debug!("Reconnect drain finished after {} passes", report.passes)
            }
            DrainOutcome::AlreadySyncing => debug!("Reconnect drain folded into running drain"),
            DrainOutcome::Offline => debug!("Went offline again before draining"),
        }
    }
}

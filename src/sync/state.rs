//! Process-wide sync status and the events a drain emits

use serde::Serialize;

use crate::error::ActionError;
use crate::queue::OfflineAction;

/// Snapshot of the sync engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub is_online: bool,
    pub is_syncing: bool,
    /// Pending offline actions
    pub queue_size: usize,
    /// Actions dropped without reaching the backend since start
    pub lost_actions: u64,
}

/// Result of one `drain()` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Passes run (more than one when requests arrived mid-drain)
    pub passes: usize,
    pub synced: usize,
    pub retried: usize,
    pub lost: usize,
    /// Queue length after the last pass
    pub remaining: usize,
}

impl DrainReport {
    pub(crate) fn absorb(&mut self, pass: DrainReport) {
        self.passes += pass.passes;
        self.synced += pass.synced;
        self.retried += pass.retried;
        self.lost += pass.lost;
        self.remaining = pass.remaining;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain is running; it will run one more pass for this request
    AlreadySyncing,
    Offline,
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Broadcast to subscribers while draining
#[derive(Debug, Clone)]
pub enum SyncEvent {
    DrainStarted { pending: usize },
    ActionSynced { id: String },
    ActionRetrying { id: String, retry_count: u32, error: ActionError },
    /// The action will never reach the backend: "pending changes lost"
    ActionLost { action: OfflineAction, error: ActionError },
    DrainFinished(DrainReport),
}

use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::storage::{self, DurableStore, HEARTBEAT_KEY, LAST_LOCATION_TIMESTAMP_KEY};

/// Liveness of the background capture task.
///
/// Two independent last-write-wins timestamps are kept:
/// - `heartbeat`: the scheduler invoked the task, whatever the outcome
/// - `last-location-timestamp`: a sample actually reached a consumer or the queue
pub struct HeartbeatMonitor {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
}

impl HeartbeatMonitor {
    pub fn new(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record that the task ran
    pub fn touch(&self) -> bool {
        self.write(HEARTBEAT_KEY)
    }

    /// Record that a sample was delivered or persisted
    pub fn record_sample(&self) -> bool {
        self.write(LAST_LOCATION_TIMESTAMP_KEY)
    }

    pub fn last_heartbeat(&self) -> Option<i64> {
        self.read(HEARTBEAT_KEY)
    }

    pub fn last_sample_time(&self) -> Option<i64> {
        self.read(LAST_LOCATION_TIMESTAMP_KEY)
    }

    /// False once `max_silence_ms` or more has passed since the last heartbeat,
    /// or if the task never ran.
    pub fn check_health(&self, max_silence_ms: i64) -> bool {
        self.within(self.last_heartbeat(), max_silence_ms)
    }

    /// Same rule as [`check_health`](Self::check_health), applied to sample flow
    pub fn check_sample_flow(&self, max_silence_ms: i64) -> bool {
        self.within(self.last_sample_time(), max_silence_ms)
    }

    fn within(&self, last: Option<i64>, max_silence_ms: i64) -> bool {
        match last {
            Some(last) => self.clock.now_millis().saturating_sub(last) < max_silence_ms,
            None => false,
        }
    }

    fn write(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        match storage::save_json(self.store.as_ref(), key, &now) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {}: {}", key, e);
                false
            }
        }
    }

    fn read(&self, key: &str) -> Option<i64> {
        match storage::load_json(self.store.as_ref(), key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", key, e);
                None
            }
        }
    }
}

//! Entry point invoked by the OS scheduler with a batch of fixes.
//!
//! The task itself never changes; what it does with samples is controlled by
//! the [`CaptureStrategy`] swapped in by foreground code.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::heartbeat::HeartbeatMonitor;
use super::queue::LocationQueue;
use super::types::{LocationSample, RawSample};

/// Error delivered by the platform instead of a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location provider error: {0}")]
    Provider(String),
}

/// What the OS hands to the task on each invocation
pub type TaskPayload = Result<Vec<RawSample>, TaskError>;

/// A live foreground consumer. Called synchronously for each sample.
pub trait SampleConsumer: Send + Sync {
    fn deliver(&self, sample: &LocationSample) -> anyhow::Result<()>;
}

pub trait TaskErrorHandler: Send + Sync {
    fn on_error(&self, error: &TaskError);
}

/// Callbacks the task dispatches to. Empty means persist everything.
#[derive(Clone, Default)]
pub struct CaptureStrategy {
    pub consumer: Option<Arc<dyn SampleConsumer>>,
    pub error_handler: Option<Arc<dyn TaskErrorHandler>>,
}

impl CaptureStrategy {
    pub fn with_consumer(mut self, consumer: Arc<dyn SampleConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn TaskErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }
}

/// Outcome of one invocation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    /// Handed to the live consumer
    pub delivered: usize,
    /// Written to the location queue
    pub persisted: usize,
    /// Neither delivered nor persisted
    pub lost: usize,
    /// The OS delivered an error instead of samples
    pub failed: bool,
}

pub struct LocationCaptureTask {
    heartbeat: Arc<HeartbeatMonitor>,
    queue: LocationQueue,
    strategy: RwLock<Arc<CaptureStrategy>>,
}

impl LocationCaptureTask {
    pub fn new(heartbeat: Arc<HeartbeatMonitor>, queue: LocationQueue) -> Self {
        Self {
            heartbeat,
            queue,
            strategy: RwLock::new(Arc::new(CaptureStrategy::default())),
        }
    }

    /// Replace the strategy used by subsequent invocations
    pub fn set_strategy(&self, strategy: CaptureStrategy) {
        *self.strategy.write() = Arc::new(strategy);
    }

    pub fn strategy(&self) -> Arc<CaptureStrategy> {
        self.strategy.read().clone()
    }

    pub fn register_consumer(&self, consumer: Arc<dyn SampleConsumer>) {
        let next = (*self.strategy()).clone().with_consumer(consumer);
        self.set_strategy(next);
    }

    pub fn unregister_consumer(&self) {
        let mut next = (*self.strategy()).clone();
        next.consumer = None;
        self.set_strategy(next);
    }

    pub fn register_error_handler(&self, handler: Arc<dyn TaskErrorHandler>) {
        let next = (*self.strategy()).clone().with_error_handler(handler);
        self.set_strategy(next);
    }

    /// Handle one invocation. Never fails; the heartbeat is written first
    /// whatever the payload.
    pub async fn run(&self, payload: TaskPayload) -> CaptureReport {
        self.heartbeat.touch();

        let strategy = self.strategy();
        let mut report = CaptureReport::default();

        let samples = match payload {
            Err(e) => {
                error!("Location task invoked with error: {}", e);
                report.failed = true;
                if let Some(handler) = &strategy.error_handler {
                    if catch_unwind(AssertUnwindSafe(|| handler.on_error(&e))).is_err() {
                        error!("Location error handler panicked");
                    }
                }
                return report;
            }
            Ok(samples) if samples.is_empty() => {
                warn!("Location task invoked with an empty batch");
                return report;
            }
            Ok(samples) => samples,
        };

        for raw in samples {
            let sample = LocationSample::from(raw);

            if Self::deliver_direct(&strategy, &sample) {
                report.delivered += 1;
                self.heartbeat.record_sample();
                continue;
            }

            if self.queue.append(sample).await {
                report.persisted += 1;
                self.heartbeat.record_sample();
            } else {
                report.lost += 1;
            }
        }

        debug!(
            "Location batch handled: {} delivered, {} persisted, {} lost",
            report.delivered, report.persisted, report.lost
        );
        report
    }

    fn deliver_direct(strategy: &CaptureStrategy, sample: &LocationSample) -> bool {
        let Some(consumer) = &strategy.consumer else {
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| consumer.deliver(sample))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Live consumer rejected sample, persisting instead: {}", e);
                false
            }
            Err(_) => {
                warn!("Live consumer panicked, persisting instead");
                false
            }
        }
    }
}

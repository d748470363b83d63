//! Background location capture
//!
//! - `task`: the OS-invoked entry point and its direct-delivery path
//! - `queue`: bounded durable buffer of samples no consumer took
//! - `heartbeat`: liveness and sample-flow timestamps
//! - `provider`: idempotent control of the platform location service

pub mod heartbeat;
pub mod provider;
pub mod queue;
pub mod task;
pub mod types;

pub use heartbeat::HeartbeatMonitor;
pub use provider::{LocationProvider, ProviderOptions, TrackingController};
pub use queue::{LocationQueue, MAX_PERSISTED_LOCATIONS};
pub use task::{
    CaptureReport, CaptureStrategy, LocationCaptureTask, SampleConsumer, TaskError, TaskErrorHandler,
    TaskPayload,
};
pub use types::{LocationSample, RawSample};

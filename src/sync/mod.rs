//! Synchronization of deferred mutations with the backend
//!
//! This module provides:
//! - The remote API seam, one handler per action type
//! - A `reqwest` implementation with per-call timeouts
//! - The sync engine that drains the offline action queue
//!
//! Delivery is at-least-once: an action is only removed after its handler
//! succeeds, or after it is given up on.

pub mod engine;
pub mod http;
pub mod remote;
pub mod state;

// Re-export key types
pub use engine::{Submission, SyncConfig, SyncEngine, GIVE_UP_THRESHOLD};
pub use http::HttpRemoteApi;
pub use remote::{dispatch, RemoteApi, RemoteResult};
pub use state::{DrainOutcome, DrainReport, SyncEvent, SyncState};

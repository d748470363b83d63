pub mod cache;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod location;
pub mod queue;
pub mod runtime;
pub mod storage;
pub mod sync;

pub use cache::{CachedRead, EntityKind, LocalCacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use connectivity::{ConnectivityListener, ConnectivityMonitor};
pub use error::{ActionError, SyncError, SyncResult};
pub use location::{
    CaptureStrategy, HeartbeatMonitor, LocationCaptureTask, LocationQueue, LocationSample, RawSample,
    TrackingController,
};
pub use queue::{ActionType, OfflineAction, OfflineActionQueue};
pub use runtime::{HealthReport, OfflineRuntime};
pub use storage::{DurableStore, MemoryStore, RocksStore};
pub use sync::{DrainOutcome, DrainReport, HttpRemoteApi, RemoteApi, SyncEngine, SyncEvent, SyncState};

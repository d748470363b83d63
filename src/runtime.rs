//! Wires every component onto one durable store
//!
//! There is exactly one `OfflineRuntime` per process; background capture,
//! the sync engine and foreground reads all share its actors.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::LocalCacheStore;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncResult;
use crate::location::{HeartbeatMonitor, LocationCaptureTask, LocationQueue};
use crate::queue::OfflineActionQueue;
use crate::storage::{DurableStore, RocksStore};
use crate::sync::{DrainOutcome, HttpRemoteApi, RemoteApi, SyncEngine, SyncState};

/// Snapshot returned by the health query surface
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Capture task invoked within the configured silence window
    pub healthy: bool,
    /// Samples arrived within the configured silence window
    pub samples_flowing: bool,
    pub last_heartbeat: Option<i64>,
    pub last_sample_time: Option<i64>,
    pub location_queue_size: usize,
    pub sync: SyncState,
}

pub struct OfflineRuntime {
    config: Config,
    rocks: Option<RocksStore>,
    heartbeat: Arc<HeartbeatMonitor>,
    locations: LocationQueue,
    capture: Arc<LocationCaptureTask>,
    engine: Arc<SyncEngine>,
    connectivity: Arc<ConnectivityMonitor>,
    cache: Arc<LocalCacheStore>,
    monitor_task: Option<JoinHandle<()>>,
}

impl OfflineRuntime {
    /// Open the RocksDB store under `config.data_dir` and talk to the
    /// configured HTTP backend
    pub fn open(config: Config) -> SyncResult<Self> {
        let rocks = RocksStore::open(&config.data_dir)?;
        info!("Opened store at {}", rocks.path().display());

        let token = config.has_auth().then(|| config.api.token.clone());
        let api = HttpRemoteApi::new(
            config.api.base_url.clone(),
            token,
            config.remote_timeout(),
            config.probe_timeout(),
        )?
        .with_health_path(config.api.health_path.clone());

        let mut runtime = Self::new(Arc::new(rocks.clone()), Arc::new(api), Arc::new(SystemClock), config);
        runtime.rocks = Some(rocks);
        Ok(runtime)
    }

    /// Build on any store and remote API. Must be called inside a tokio
    /// runtime, as the queue actors are spawned here.
    pub fn new(
        store: Arc<dyn DurableStore>,
        api: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let heartbeat = Arc::new(HeartbeatMonitor::new(store.clone(), clock.clone()));
        let locations = LocationQueue::spawn(store.clone(), clock.clone(), config.location.max_persisted);
        let capture = Arc::new(LocationCaptureTask::new(heartbeat.clone(), locations.clone()));

        let connectivity = Arc::new(ConnectivityMonitor::new(api.clone(), config.probe_timeout()));
        let actions = OfflineActionQueue::spawn(store.clone(), clock.clone());
        let engine = Arc::new(SyncEngine::new(
            actions,
            api,
            clock.clone(),
            connectivity.subscribe(),
            config.sync_config(),
        ));
        connectivity.set_listener(engine.clone());

        let cache = Arc::new(LocalCacheStore::new(store, clock));

        Self {
            config,
            rocks: None,
            heartbeat,
            locations,
            capture,
            engine,
            connectivity,
            cache,
            monitor_task: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    pub fn locations(&self) -> &LocationQueue {
        &self.locations
    }

    /// Entry point handed to the OS background task
    pub fn capture_task(&self) -> &Arc<LocationCaptureTask> {
        &self.capture
    }

    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn cache(&self) -> &Arc<LocalCacheStore> {
        &self.cache
    }

    /// Probe once, then keep probing in the background. The first successful
    /// probe drains whatever was queued before the restart.
    pub async fn start(&mut self) -> bool {
        let online = self.connectivity.refresh().await;
        if self.monitor_task.is_none() {
            let monitor = self.connectivity.clone();
            self.monitor_task = Some(tokio::spawn(monitor.run(self.config.probe_interval())));
        }
        online
    }

    /// One-shot drain for callers that want the report: check reachability
    /// without triggering the reconnect drain, then drain here.
    pub async fn drain_once(&self) -> DrainOutcome {
        self.connectivity.recheck().await;
        self.engine.drain().await
    }

    pub async fn shutdown(&mut self) {
        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }
        if let Some(rocks) = &self.rocks {
            if let Err(e) = rocks.flush() {
                error!("Failed to flush store on shutdown: {}", e);
            }
        }
        info!("Offline runtime stopped");
    }

    pub fn check_health(&self, max_silence_ms: i64) -> bool {
        self.heartbeat.check_health(max_silence_ms)
    }

    pub async fn get_queue_size(&self) -> usize {
        self.locations.len().await
    }

    pub fn get_last_sample_time(&self) -> Option<i64> {
        self.heartbeat.last_sample_time()
    }

    pub async fn health_report(&self) -> HealthReport {
        let max_silence = self.config.location.health_max_silence_ms;
        HealthReport {
            healthy: self.heartbeat.check_health(max_silence),
            samples_flowing: self.heartbeat.check_sample_flow(max_silence),
            last_heartbeat: self.heartbeat.last_heartbeat(),
            last_sample_time: self.heartbeat.last_sample_time(),
            location_queue_size: self.locations.len().await,
            sync: self.engine.state().await,
        }
    }

    /// Interval used by `start()` for the background probe
    pub fn probe_interval(&self) -> Duration {
        self.config.probe_interval()
    }
}

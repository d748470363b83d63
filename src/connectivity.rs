//! Online/offline tracking
//!
//! "Online" means the link is up AND the backend answered a reachability
//! probe. Radio state alone is not enough.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::sync::RemoteApi;

/// Notified once per offline→online transition
#[async_trait]
pub trait ConnectivityListener: Send + Sync {
    async fn on_reconnect(&self);
}

pub struct ConnectivityMonitor {
    api: Arc<dyn RemoteApi>,
    probe_timeout: Duration,
    link_up: AtomicBool,
    online: watch::Sender<bool>,
    listener: RwLock<Option<Arc<dyn ConnectivityListener>>>,
    // Serializes probe + state swap so each transition is observed once
    update_lock: tokio::sync::Mutex<()>,
}

impl ConnectivityMonitor {
    /// Starts offline until the first probe succeeds
    pub fn new(api: Arc<dyn RemoteApi>, probe_timeout: Duration) -> Self {
        let (online, _) = watch::channel(false);
        Self {
            api,
            probe_timeout,
            link_up: AtomicBool::new(true),
            online,
            listener: RwLock::new(None),
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn ConnectivityListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Receiver that always holds the current online state
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Current state without probing, for call sites choosing between a
    /// remote call and the offline queue
    pub fn check_connection(&self) -> bool {
        *self.online.borrow()
    }

    /// Platform link-state event
    pub async fn set_link_state(&self, link_up: bool) -> bool {
        self.link_up.store(link_up, Ordering::SeqCst);
        self.refresh().await
    }

    /// Re-probe reachability and publish the result. Returns the new state.
    /// On a reconnect the listener runs before this returns.
    pub async fn refresh(&self) -> bool {
        if let Some(listener) = self.update().await {
            listener.on_reconnect().await;
        }
        self.check_connection()
    }

    /// Check reachability and publish without notifying the listener, for a
    /// caller that drains on its own right after
    pub async fn recheck(&self) -> bool {
        self.update().await;
        self.check_connection()
    }

    /// Re-probe on a fixed interval until the task is dropped. Reconnect
    /// handling runs on its own task, so checks continue during a drain.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        info!("Starting connectivity monitor (interval: {:?})", interval);
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if let Some(listener) = self.update().await {
                tokio::spawn(async move { listener.on_reconnect().await });
            }
        }
    }

    /// Check reachability and swap the published state. Returns the listener to notify
    /// when this call observed an offline→online transition.
    async fn update(&self) -> Option<Arc<dyn ConnectivityListener>> {
        let _guard = self.update_lock.lock().await;

        let link_up = self.link_up.load(Ordering::SeqCst);
        let online = link_up && self.probe().await;
        let was_online = self.online.send_replace(online);

        if was_online == online {
            return None;
        }
        if !online {
            warn!("Connectivity lost (link up: {})", link_up);
            return None;
        }
        info!("Connectivity restored");
        self.listener.read().clone()
    }

    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.api.is_reachable()).await {
            Ok(reachable) => reachable,
            Err(_) => {
                debug!("Reachability probe timed out after {:?}", self.probe_timeout);
                false
            }
        }
    }
}

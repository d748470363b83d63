use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// Settings passed to the platform provider on start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Cadence of fixes; ~3 Hz by default
    pub interval_ms: u64,
    /// Minimum movement before a fix is reported
    pub distance_filter_m: f64,
    /// Whether the platform may suspend fixes while the device is stationary
    pub pauses_when_stationary: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            interval_ms: 333,
            distance_filter_m: 0.0,
            pauses_when_stationary: false,
        }
    }
}

/// Platform location service. Calls may be made in any state.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn start(&self, options: &ProviderOptions) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;

    async fn is_active(&self) -> anyhow::Result<bool>;
}

/// Idempotent start/stop on top of a [`LocationProvider`]
pub struct TrackingController {
    provider: Arc<dyn LocationProvider>,
    options: ProviderOptions,
    call_timeout: Duration,
}

impl TrackingController {
    pub fn new(provider: Arc<dyn LocationProvider>, options: ProviderOptions, call_timeout: Duration) -> Self {
        Self {
            provider,
            options,
            call_timeout,
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Current running state; false if the provider cannot be queried
    pub async fn is_active(&self) -> bool {
        match self.query_active().await {
            Ok(active) => active,
            Err(e) => {
                warn!("Could not query location provider: {}", e);
                false
            }
        }
    }

    /// Start tracking. Returns false if it was already running.
    pub async fn start(&self) -> SyncResult<bool> {
        if self.query_active().await? {
            return Ok(false);
        }
        self.call("start", self.provider.start(&self.options)).await?;
        info!("Location tracking started ({} ms interval)", self.options.interval_ms);
        Ok(true)
    }

    /// Stop tracking and confirm the provider actually stopped.
    /// Returns false if it was not running.
    pub async fn stop(&self) -> SyncResult<bool> {
        if !self.query_active().await? {
            return Ok(false);
        }

        for attempt in 1..=2 {
            self.call("stop", self.provider.stop()).await?;
            if !self.query_active().await? {
                info!("Location tracking stopped");
                return Ok(true);
            }
            warn!("Location provider still active after stop (attempt {})", attempt);
        }
        Err(SyncError::ProviderStillActive)
    }

    async fn query_active(&self) -> SyncResult<bool> {
        self.call("is_active", self.provider.is_active()).await
    }

    async fn call<T>(&self, name: &str, fut: impl Future<Output = anyhow::Result<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SyncError::ProviderError(format!("{}: {}", name, e))),
            Err(_) => Err(SyncError::Timeout(format!("location provider {}", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeProvider {
        active: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        /// Number of stop calls to ignore
        sticky_stops: AtomicUsize,
    }

    #[async_trait]
    impl LocationProvider for FakeProvider {
        async fn start(&self, _options: &ProviderOptions) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.sticky_stops.load(Ordering::SeqCst) > 0 {
                self.sticky_stops.fetch_sub(1, Ordering::SeqCst);
                return Ok(());
            }
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn is_active(&self) -> anyhow::Result<bool> {
            Ok(self.active.load(Ordering::SeqCst))
        }
    }

    fn controller(provider: Arc<FakeProvider>) -> TrackingController {
        TrackingController::new(provider, ProviderOptions::default(), Duration::from_secs(1))
    }

    #[test]
    fn test_default_options() {
        let options = ProviderOptions::default();
        assert_eq!(options.interval_ms, 333);
        assert!(!options.pauses_when_stationary);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let provider = Arc::new(FakeProvider::default());
        let ctl = controller(provider.clone());

        assert!(tokio_test::assert_ok!(ctl.start().await));
        assert!(!tokio_test::assert_ok!(ctl.start().await));
        assert_eq!(provider.starts.load(Ordering::SeqCst), 1);
        assert!(ctl.is_active().await);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let provider = Arc::new(FakeProvider::default());
        let ctl = controller(provider.clone());

        assert!(!ctl.stop().await.unwrap());
        assert_eq!(provider.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_retries_until_confirmed() {
        let provider = Arc::new(FakeProvider::default());
        let ctl = controller(provider.clone());
        ctl.start().await.unwrap();

        provider.sticky_stops.store(1, Ordering::SeqCst);
        assert!(ctl.stop().await.unwrap());
        assert_eq!(provider.stops.load(Ordering::SeqCst), 2);
        assert!(!ctl.is_active().await);
    }

    #[tokio::test]
    async fn test_stop_reports_provider_that_keeps_running() {
        let provider = Arc::new(FakeProvider::default());
        let ctl = controller(provider.clone());
        ctl.start().await.unwrap();

        provider.sticky_stops.store(5, Ordering::SeqCst);
        let err = tokio_test::assert_err!(ctl.stop().await);
        assert!(matches!(err, SyncError::ProviderStillActive));
    }
}

//! Egress pool with background refresh.
//!
//! The live list is guarded by an `RwLock`; refreshes are serialized by a
//! dedicated writer lock so only one fetch mutates the pool at a time.
//! Rounds never read the live structure — they take a `snapshot()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EgressConfig;
use crate::metrics;

use super::{EgressDescriptor, EgressError, EgressProvider};

/// Owned pool of egress descriptors.
///
/// Without a provider the pool serves the configured static list
/// unchanged. With a provider, the static list is the fallback until the
/// first successful fetch, and a failed fetch keeps whatever list was
/// last known good.
pub struct EgressPool {
    descriptors: RwLock<Vec<EgressDescriptor>>,
    provider: Option<Arc<dyn EgressProvider>>,
    /// Serializes refreshes and tracks the last fetch time.
    refresh_guard: Mutex<Option<Instant>>,
    refresh_interval: Duration,
    min_refresh_interval: Duration,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl EgressPool {
    /// Create a new pool from configuration and an optional provider.
    pub fn new(config: &EgressConfig, provider: Option<Arc<dyn EgressProvider>>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            descriptors: RwLock::new(config.pool.clone()),
            provider,
            refresh_guard: Mutex::new(None),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            min_refresh_interval: Duration::from_secs(config.min_refresh_interval_secs),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Take an immutable snapshot of the current pool.
    pub async fn snapshot(&self) -> Vec<EgressDescriptor> {
        self.descriptors.read().await.clone()
    }

    /// Number of descriptors currently in the pool.
    pub async fn len(&self) -> usize {
        self.descriptors.read().await.len()
    }

    /// Whether the pool is currently empty.
    pub async fn is_empty(&self) -> bool {
        self.descriptors.read().await.is_empty()
    }

    /// Refresh the pool from the provider.
    ///
    /// No-op without a provider. Fetches are rate-bounded: a refresh
    /// arriving within `min_refresh_interval` of the previous one is
    /// skipped. Provider failures keep the last known good list.
    pub async fn refresh(&self) {
        let Some(ref provider) = self.provider else {
            return;
        };

        let mut last_fetch = self.refresh_guard.lock().await;

        if let Some(at) = *last_fetch {
            if at.elapsed() < self.min_refresh_interval {
                debug!("Skipping egress refresh (too soon after previous fetch)");
                return;
            }
        }
        *last_fetch = Some(Instant::now());

        match provider.fetch().await {
            Ok(descriptors) => {
                let count = descriptors.len();
                *self.descriptors.write().await = descriptors;
                metrics::EGRESS_REFRESHES.with_label_values(&["ok"]).inc();
                info!(provider = provider.name(), count, "Egress pool refreshed");
            }
            Err(EgressError::EmptyPool) => {
                metrics::EGRESS_REFRESHES.with_label_values(&["empty"]).inc();
                warn!(
                    provider = provider.name(),
                    "Egress provider returned no descriptors, keeping current pool"
                );
            }
            Err(e) => {
                metrics::EGRESS_REFRESHES.with_label_values(&["error"]).inc();
                warn!(
                    provider = provider.name(),
                    "Egress refresh failed: {}, keeping current pool", e
                );
            }
        }
    }

    /// Start the background refresh loop.
    pub async fn start(self: &Arc<Self>) {
        if self.provider.is_none() {
            debug!("No egress provider configured, refresh loop not started");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Egress refresh loop already running");
            return;
        }

        let pool = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Prime the pool once before serving requests.
        pool.refresh().await;

        tokio::spawn(async move {
            info!("Egress refresh loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Egress refresh loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(pool.refresh_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        pool.refresh().await;
                    }
                }
            }
            info!("Egress refresh loop stopped");
        });
    }

    /// Stop the background refresh loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockEgressProvider};

    fn static_config(hosts: &[&str]) -> EgressConfig {
        EgressConfig {
            pool: hosts.iter().map(|h| fixtures::egress(h)).collect(),
            provider: None,
            refresh_interval_secs: 300,
            min_refresh_interval_secs: 30,
        }
    }

    #[tokio::test]
    async fn test_static_pool_snapshot() {
        let pool = EgressPool::new(&static_config(&["a", "b", "c"]), None);
        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].host, "a");
    }

    #[tokio::test]
    async fn test_refresh_without_provider_is_noop() {
        let pool = EgressPool::new(&static_config(&["a"]), None);
        pool.refresh().await;
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_pool() {
        let provider = Arc::new(MockEgressProvider::with_descriptors(vec![
            fixtures::egress("x"),
            fixtures::egress("y"),
        ]));
        let mut config = static_config(&["a"]);
        config.min_refresh_interval_secs = 0;

        let pool = EgressPool::new(&config, Some(provider.clone() as _));
        pool.refresh().await;

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].host, "x");
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_current_pool() {
        let provider = Arc::new(MockEgressProvider::with_descriptors(vec![]));
        provider.set_fail(true);
        let mut config = static_config(&["a", "b"]);
        config.min_refresh_interval_secs = 0;

        let pool = EgressPool::new(&config, Some(provider as _));
        pool.refresh().await;

        // Static fallback survives the failed fetch
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn test_refresh_is_rate_bounded() {
        let provider = Arc::new(MockEgressProvider::with_descriptors(vec![
            fixtures::egress("x"),
        ]));
        let config = static_config(&["a"]);

        let pool = EgressPool::new(&config, Some(provider.clone() as _));
        pool.refresh().await;
        pool.refresh().await;

        // Second refresh lands inside min_refresh_interval and is skipped
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_refresh() {
        let provider = Arc::new(MockEgressProvider::with_descriptors(vec![
            fixtures::egress("x"),
        ]));
        let mut config = static_config(&["a", "b"]);
        config.min_refresh_interval_secs = 0;

        let pool = EgressPool::new(&config, Some(provider as _));
        let snapshot = pool.snapshot().await;
        pool.refresh().await;

        // The round's snapshot is unaffected by the mid-round refresh
        assert_eq!(snapshot.len(), 2);
        assert_eq!(pool.len().await, 1);
    }
}

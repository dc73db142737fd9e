use crate::services::{link_cache::LinkCache, oidc::OidcService};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically drops expired cache entries and abandoned OIDC logins.
pub struct Janitor {
    cache: LinkCache,
    oidc: Arc<OidcService>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Janitor {
    pub fn new(
        cache: LinkCache,
        oidc: Arc<OidcService>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cache,
            oidc,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🧹 Janitor started (every {:?})", self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Janitor shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep();
                }
            }
        }
    }

    pub fn sweep(&self) {
        let cached = self.cache.purge_expired();
        let logins = self.oidc.purge_expired();
        if cached > 0 || logins > 0 {
            tracing::debug!(
                cached,
                logins,
                "Swept expired cache entries and pending logins"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let cache = LinkCache::new(Duration::from_secs(60), 10);
        let oidc = Arc::new(OidcService::new(&AppConfig::default()).unwrap());
        let (tx, rx) = watch::channel(false);
        let janitor = Janitor::new(cache, oidc, Duration::from_secs(3600), rx);

        let handle = tokio::spawn(janitor.run());
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("janitor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_purges_cache() {
        let cache = LinkCache::new(Duration::from_millis(1), 10);
        cache.insert("abc", "https://example.com", cache.generation());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let oidc = Arc::new(OidcService::new(&AppConfig::default()).unwrap());
        let (_tx, rx) = watch::channel(false);
        let janitor = Janitor::new(cache.clone(), oidc, Duration::from_secs(3600), rx);
        janitor.sweep();
        assert!(cache.is_empty());
    }
}

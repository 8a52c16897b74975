pub mod lb;
pub mod store;

use crate::error::ScrapeError;
use crate::models::{ProxyEntry, ProxyPoolStats, ProxyScheme};
use lb::LoadBalancerSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::ProxyStateStore;
use tracing::{info, warn};

/// EWMA smoothing factor for `report_outcome`. Chosen over the original
/// service's ad-hoc `+0.1`/`-0.2` increments so the rate converges smoothly
/// regardless of how unlucky or lucky a short run of outcomes is.
const SUCCESS_RATE_ALPHA: f64 = 0.1;
const LATENCY_ALPHA: f64 = 0.3;
const DEFAULT_F_MAX: u32 = 3;

/// Coordinates a pool of proxy servers: selection, health checking,
/// discovery, and upstream publication. Holds no proxy state itself —
/// that lives behind the `ProxyStateStore` so a caller can swap in a
/// Redis-backed store without touching this type.
pub struct ProxyPoolManager {
    store: Arc<dyn ProxyStateStore>,
    lb_sink: Arc<dyn LoadBalancerSink>,
    health_check_client: reqwest::Client,
    f_max: u32,
}

impl ProxyPoolManager {
    pub fn new(store: Arc<dyn ProxyStateStore>, lb_sink: Arc<dyn LoadBalancerSink>) -> Self {
        Self::with_f_max(store, lb_sink, DEFAULT_F_MAX)
    }

    /// Same as `new`, but with `F_MAX` (spec.md §6) set explicitly instead
    /// of the default of 3 consecutive failures.
    pub fn with_f_max(store: Arc<dyn ProxyStateStore>, lb_sink: Arc<dyn LoadBalancerSink>, f_max: u32) -> Self {
        Self {
            store,
            lb_sink,
            health_check_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with static config"),
            f_max,
        }
    }

    pub async fn add_proxy(&self, url: &str, scheme: ProxyScheme) -> bool {
        if self.store.hexists(url).await {
            return false;
        }
        self.store.sadd(url).await;
        self.store.hset(url, ProxyEntry::new(url, scheme)).await;
        info!(proxy = url, "added proxy to pool");
        true
    }

    pub async fn remove_proxy(&self, url: &str) -> bool {
        if !self.store.hexists(url).await {
            return false;
        }
        self.store.hdel(url).await;
        true
    }

    pub async fn all_proxies(&self) -> Vec<ProxyEntry> {
        let mut out = Vec::new();
        for url in self.store.smembers().await {
            if let Some(entry) = self.store.hget(&url).await {
                out.push(entry);
            }
        }
        out
    }

    /// Highest `health_score` among active proxies, or `None` if the pool is
    /// empty or every proxy is inactive.
    pub async fn get_best_proxy(&self) -> Option<ProxyEntry> {
        let mut best: Option<ProxyEntry> = None;
        for entry in self.all_proxies().await {
            if !entry.active {
                continue;
            }
            let score = entry.health_score();
            if best.as_ref().map_or(true, |b| score > b.health_score()) {
                best = Some(entry);
            }
        }
        best
    }

    /// Records the outcome of using `url` for one request. Success moves
    /// `success_rate`/`latency_ewma_secs` toward the observed value via an
    /// exponential moving average; three consecutive failures deactivate
    /// the proxy.
    pub async fn report_outcome(&self, url: &str, success: bool, latency_secs: f64) {
        let Some(mut entry) = self.store.hget(url).await else {
            warn!(proxy = url, "report_outcome for unknown proxy");
            return;
        };

        entry.latency_ewma_secs =
            entry.latency_ewma_secs * (1.0 - LATENCY_ALPHA) + latency_secs * LATENCY_ALPHA;
        entry.last_checked_at = Some(chrono::Utc::now());

        if success {
            entry.consecutive_failures = 0;
            entry.success_rate =
                entry.success_rate * (1.0 - SUCCESS_RATE_ALPHA) + SUCCESS_RATE_ALPHA;
            entry.active = true;
        } else {
            entry.consecutive_failures += 1;
            entry.success_rate = (entry.success_rate * (1.0 - SUCCESS_RATE_ALPHA)).max(0.0);
            if entry.consecutive_failures >= self.f_max {
                entry.active = false;
            }
        }

        self.store.hset(url, entry).await;
    }

    /// Probes a single proxy against `probe_url` and reports the outcome.
    pub async fn check_one(&self, url: &str, probe_url: &str) {
        let scheme_prefixed = url.to_string();
        let started = Instant::now();
        let result = async {
            let proxy = reqwest::Proxy::all(&scheme_prefixed)
                .map_err(|e| ScrapeError::Configuration(e.to_string()))?;
            let client = self
                .health_check_client
                .clone()
                .into_builder_with_proxy(proxy)?;
            client
                .get(probe_url)
                .send()
                .await
                .map_err(ScrapeError::from)
                .map(|r| r.status().is_success())
        }
        .await;

        let latency = started.elapsed().as_secs_f64();
        match result {
            Ok(ok) => self.report_outcome(url, ok, latency).await,
            Err(_) => self.report_outcome(url, false, latency).await,
        }
    }

    /// Checks every proxy in the pool, `batch_size` at a time, with a short
    /// pause between batches, then republishes the upstream document.
    pub async fn continuous_health_check(&self, probe_url: &str, batch_size: usize) {
        let proxies = self.all_proxies().await;
        info!(count = proxies.len(), "checking proxy pool health");

        for batch in proxies.chunks(batch_size.max(1)) {
            let checks = batch
                .iter()
                .map(|p| self.check_one(&p.url, probe_url));
            futures::future::join_all(checks).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if let Err(e) = self.publish_upstream().await {
            warn!(error = %e, "failed to publish upstream document");
        }
    }

    pub async fn publish_upstream(&self) -> Result<(), ScrapeError> {
        let pool = self.all_proxies().await;
        let doc = lb::build_upstream_document(&pool);
        self.lb_sink.publish(&doc).await
    }

    /// Adds newly discovered proxy URLs (deduping against the existing
    /// pool), capped at `max_new`.
    pub async fn ingest_discovered(&self, candidates: Vec<String>, max_new: usize) -> usize {
        let mut added = 0;
        for url in candidates {
            if added >= max_new {
                break;
            }
            if self.add_proxy(&url, ProxyScheme::Http).await {
                added += 1;
            }
        }
        info!(added, "ingested discovered proxies");
        added
    }

    /// Pulls candidate proxies from each configured discovery URL (one
    /// `host:port` or `scheme://host:port` per line of the response body),
    /// deduplicates against the existing pool, and caps the total added
    /// this cycle at `max_new`. A source that fails to fetch is logged and
    /// skipped — one bad source must not abort the whole refresh.
    pub async fn refresh_from_sources(&self, discovery_urls: &[String], max_new: usize) -> usize {
        let mut candidates = Vec::new();
        for source in discovery_urls {
            let response = match self.health_check_client.get(source).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(source, error = %e, "discovery source unreachable");
                    continue;
                }
            };
            if !response.status().is_success() {
                warn!(source, status = %response.status(), "discovery source returned non-success status");
                continue;
            }
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!(source, error = %e, "discovery source returned unreadable body");
                    continue;
                }
            };

            for line in body.lines() {
                let line = line.trim();
                if line.is_empty() || !line.contains(':') {
                    continue;
                }
                let url = if line.contains("://") {
                    line.to_string()
                } else if line.matches('.').count() == 3 {
                    // bare `ip:port`, the format the original free-proxy-list
                    // sources return
                    format!("http://{line}")
                } else {
                    continue;
                };
                candidates.push(url);
            }
        }

        self.ingest_discovered(candidates, max_new).await
    }

    /// Spawns the health-check background task (spec.md §4.2, activity 1):
    /// every `interval`, probe the whole pool in `batch_size`-sized
    /// concurrent batches against `probe_url`, then republish the upstream
    /// document. Runs until the returned handle is aborted.
    pub fn spawn_health_check_loop(
        self: Arc<Self>,
        interval: Duration,
        batch_size: usize,
        probe_url: String,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.continuous_health_check(&probe_url, batch_size).await;
            }
        })
    }

    /// Spawns the discovery background task (spec.md §4.2, activity 2):
    /// every `interval`, call `refresh_from_sources`, capped at `max_new`
    /// newly-added proxies per cycle. A single cycle's failure (source
    /// unreachable) is logged inside `refresh_from_sources` and never
    /// terminates the loop.
    pub fn spawn_discovery_loop(
        self: Arc<Self>,
        interval: Duration,
        discovery_urls: Vec<String>,
        max_new: usize,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let added = self.refresh_from_sources(&discovery_urls, max_new).await;
                info!(added, "discovery cycle complete");
            }
        })
    }

    pub async fn stats(&self) -> ProxyPoolStats {
        let proxies = self.all_proxies().await;
        let total = proxies.len();
        let healthy = proxies.iter().filter(|p| p.active).count();
        let avg_latency = if total == 0 {
            0.0
        } else {
            proxies.iter().map(|p| p.latency_ewma_secs).sum::<f64>() / total as f64
        };
        let avg_success = if total == 0 {
            0.0
        } else {
            proxies.iter().map(|p| p.success_rate).sum::<f64>() / total as f64
        };
        ProxyPoolStats {
            total,
            healthy,
            unhealthy: total - healthy,
            avg_latency_secs: avg_latency,
            avg_success_rate: avg_success,
        }
    }
}

trait ReqwestClientExt {
    fn into_builder_with_proxy(self, proxy: reqwest::Proxy) -> Result<reqwest::Client, ScrapeError>;
}

impl ReqwestClientExt for reqwest::Client {
    fn into_builder_with_proxy(self, proxy: reqwest::Proxy) -> Result<reqwest::Client, ScrapeError> {
        reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(ScrapeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryProxyStore;

    fn manager() -> ProxyPoolManager {
        ProxyPoolManager::new(
            Arc::new(InMemoryProxyStore::new()),
            Arc::new(lb::NullLoadBalancerSink),
        )
    }

    #[tokio::test]
    async fn get_best_proxy_prefers_higher_health_score() {
        let mgr = manager();
        mgr.add_proxy("http://slow:1", ProxyScheme::Http).await;
        mgr.add_proxy("http://fast:1", ProxyScheme::Http).await;
        mgr.report_outcome("http://slow:1", true, 5.0).await;
        mgr.report_outcome("http://fast:1", true, 0.1).await;

        let best = mgr.get_best_proxy().await.unwrap();
        assert_eq!(best.url, "http://fast:1");
    }

    #[tokio::test]
    async fn three_consecutive_failures_deactivates() {
        let mgr = manager();
        mgr.add_proxy("http://flaky:1", ProxyScheme::Http).await;
        for _ in 0..3 {
            mgr.report_outcome("http://flaky:1", false, 1.0).await;
        }
        assert!(mgr.get_best_proxy().await.is_none());
    }

    #[tokio::test]
    async fn a_single_success_reactivates_failure_counter() {
        let mgr = manager();
        mgr.add_proxy("http://p:1", ProxyScheme::Http).await;
        mgr.report_outcome("http://p:1", false, 1.0).await;
        mgr.report_outcome("http://p:1", false, 1.0).await;
        mgr.report_outcome("http://p:1", true, 1.0).await;
        let entry = mgr.store.hget("http://p:1").await.unwrap();
        assert_eq!(entry.consecutive_failures, 0);
        assert!(entry.active);
    }

    #[tokio::test]
    async fn ingest_discovered_respects_cap_and_dedup() {
        let mgr = manager();
        mgr.add_proxy("http://existing:1", ProxyScheme::Http).await;
        let candidates = vec![
            "http://existing:1".to_string(),
            "http://new1:1".to_string(),
            "http://new2:1".to_string(),
        ];
        let added = mgr.ingest_discovered(candidates, 1).await;
        assert_eq!(added, 1);
    }
}

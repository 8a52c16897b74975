pub mod driver;
pub mod fingerprint;

use crate::error::ScrapeError;
use crate::models::{BrowserFingerprint, BrowserSession};
use driver::{ContextId, HeadlessBrowserDriver};
use parking_lot::Mutex as SyncMutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

/// A leased browser session. Dropping it without calling `release()`
/// releases the concurrency permit and schedules context teardown anyway —
/// `release()` is strictly the preferred path since it can report driver
/// errors back to the caller, but cancellation or a panic must never leak
/// the permit or the underlying browser context.
pub struct LeasedSession {
    pub session: BrowserSession,
    driver: Arc<dyn HeadlessBrowserDriver>,
    permit: Option<OwnedSemaphorePermit>,
    released: bool,
}

impl LeasedSession {
    pub async fn release(mut self) -> Result<(), ScrapeError> {
        self.released = true;
        let result = self.driver.close_context(self.session.context_id).await;
        self.permit.take();
        result
    }
}

impl Drop for LeasedSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let driver = self.driver.clone();
        let ctx = self.session.context_id;
        tokio::spawn(async move {
            if let Err(e) = driver.close_context(ctx).await {
                warn!(error = %e, "context teardown on drop failed");
            }
        });
    }
}

/// Gates browser concurrency with a semaphore and enforces a per-domain
/// minimum delay between session acquisitions, mirroring the original
/// `StealthSessionManager`.
pub struct StealthSessionManager {
    driver: Arc<dyn HeadlessBrowserDriver>,
    semaphore: Arc<Semaphore>,
    proxy_pool: Vec<String>,
    last_request_at: SyncMutex<HashMap<String, Instant>>,
    min_delay: Duration,
}

impl StealthSessionManager {
    pub fn new(driver: Arc<dyn HeadlessBrowserDriver>, max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            driver,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            proxy_pool: Vec::new(),
            last_request_at: SyncMutex::new(HashMap::new()),
            min_delay,
        }
    }

    pub fn with_proxy_pool(mut self, proxy_pool: Vec<String>) -> Self {
        self.proxy_pool = proxy_pool;
        self
    }

    /// Acquires a concurrency permit, enforces the per-domain rate limit,
    /// then asks the driver for a new context. The permit is only released
    /// when the returned `LeasedSession` is dropped or explicitly released.
    pub async fn get_session(&self, domain: &str) -> Result<LeasedSession, ScrapeError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::ResourceExhausted("session semaphore closed".into()))?;

        self.enforce_rate_limit(domain).await;

        let fingerprint = fingerprint::generate_fingerprint();
        let proxy = self.pick_proxy();

        let context_id = match self
            .driver
            .new_context(&fingerprint.as_spec(), proxy.as_deref())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                // permit drops here automatically — no leaked capacity on failure
                return Err(e);
            }
        };

        info!(domain, ?context_id, "opened stealth browser session");

        Ok(LeasedSession {
            session: BrowserSession {
                id: uuid::Uuid::new_v4(),
                context_id,
                fingerprint,
                proxy,
                domain: domain.to_string(),
                created_at: Instant::now(),
            },
            driver: self.driver.clone(),
            permit: Some(permit),
            released: false,
        })
    }

    fn pick_proxy(&self) -> Option<String> {
        if self.proxy_pool.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.proxy_pool.len());
        Some(self.proxy_pool[idx].clone())
    }

    async fn enforce_rate_limit(&self, domain: &str) {
        let wait = {
            let mut last = self.last_request_at.lock();
            let now = Instant::now();
            let elapsed = last
                .get(domain)
                .map(|t| now.duration_since(*t))
                .unwrap_or(Duration::MAX);

            let wait = if elapsed < self.min_delay {
                let jitter = rand::thread_rng().gen_range(0.5..2.0);
                Some(self.min_delay - elapsed + Duration::from_secs_f64(jitter))
            } else {
                None
            };
            last.insert(domain.to_string(), now + wait.unwrap_or(Duration::ZERO));
            wait
        };

        if let Some(delay) = wait {
            tokio::time::sleep(delay).await;
        }
    }

    /// Injects the stealth init script and navigates; used by the
    /// `stealth_browser`/`full_browser` strategies.
    pub async fn navigate_with_stealth(
        &self,
        leased: &LeasedSession,
        url: &str,
    ) -> Result<(), ScrapeError> {
        let script = fingerprint::stealth_script(&leased.session.fingerprint);
        self.driver.inject_init_script(leased.session.context_id, &script).await?;

        let pre_delay = rand::thread_rng().gen_range(1.0..3.0);
        tokio::time::sleep(Duration::from_secs_f64(pre_delay)).await;

        self.driver.navigate(leased.session.context_id, url).await?;
        self.simulate_human_behavior(leased).await;
        Ok(())
    }

    /// 70% chance of a short scroll, 50% chance of a couple of mouse moves,
    /// then a 2-8s reading pause — straight from the original's behavior
    /// simulation.
    async fn simulate_human_behavior(&self, leased: &LeasedSession) {
        let mut rng = rand::thread_rng();

        if rng.gen_bool(0.7) {
            let steps = rng.gen_range(2..=5);
            for _ in 0..steps {
                let dy = rng.gen_range(100.0..800.0);
                let _ = self
                    .driver
                    .evaluate(leased.session.context_id, &format!("window.scrollBy(0, {dy})"))
                    .await;
                tokio::time::sleep(Duration::from_millis(rng.gen_range(200..600))).await;
            }
        }

        if rng.gen_bool(0.5) {
            let (vw, vh) = leased.session.fingerprint.viewport;
            for _ in 0..rng.gen_range(1..=3) {
                let x = rng.gen_range(0.0..vw as f64);
                let y = rng.gen_range(0.0..vh as f64);
                let _ = self.driver.mouse_move(leased.session.context_id, x, y).await;
                tokio::time::sleep(Duration::from_secs_f64(rng.gen_range(0.1..0.3))).await;
            }
        }

        let reading = rng.gen_range(2.0..8.0);
        tokio::time::sleep(Duration::from_secs_f64(reading)).await;
    }

    pub async fn extract_content(&self, leased: &LeasedSession) -> Result<String, ScrapeError> {
        self.driver.content(leased.session.context_id).await
    }
}

pub fn default_fingerprint_for_test() -> BrowserFingerprint {
    fingerprint::generate_fingerprint()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockDriver {
        next: AtomicU64,
        contexts_opened: AtomicU64,
        contexts_closed: AtomicU64,
    }

    impl MockDriver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                next: AtomicU64::new(1),
                contexts_opened: AtomicU64::new(0),
                contexts_closed: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl HeadlessBrowserDriver for MockDriver {
        async fn new_context(
            &self,
            _fingerprint: &fingerprint::BrowserFingerprintSpec,
            _proxy: Option<&str>,
        ) -> Result<ContextId, ScrapeError> {
            self.contexts_opened.fetch_add(1, Ordering::SeqCst);
            Ok(ContextId(self.next.fetch_add(1, Ordering::SeqCst)))
        }

        async fn navigate(&self, _ctx: ContextId, _url: &str) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn inject_init_script(&self, _ctx: ContextId, _script: &str) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn evaluate(&self, _ctx: ContextId, _script: &str) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn content(&self, _ctx: ContextId) -> Result<String, ScrapeError> {
            Ok("<html></html>".to_string())
        }

        async fn mouse_move(&self, _ctx: ContextId, _x: f64, _y: f64) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn close_context(&self, _ctx: ContextId) -> Result<(), ScrapeError> {
            self.contexts_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_semaphore() {
        let driver = MockDriver::new();
        let mgr = Arc::new(StealthSessionManager::new(driver.clone(), 1, Duration::from_millis(0)));

        let s1 = mgr.get_session("example.com").await.unwrap();

        let mgr2 = mgr.clone();
        let attempt = tokio::time::timeout(Duration::from_millis(50), mgr2.get_session("example.com")).await;
        assert!(attempt.is_err(), "second session should block while first is held");

        s1.release().await.unwrap();
    }

    #[tokio::test]
    async fn explicit_release_closes_the_context() {
        let driver = MockDriver::new();
        let mgr = StealthSessionManager::new(driver.clone(), 2, Duration::from_millis(0));
        let leased = mgr.get_session("example.com").await.unwrap();
        leased.release().await.unwrap();
        assert_eq!(driver.contexts_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_without_release_still_frees_the_permit() {
        let driver = MockDriver::new();
        let mgr = Arc::new(StealthSessionManager::new(driver.clone(), 1, Duration::from_millis(0)));
        {
            let _leased = mgr.get_session("example.com").await.unwrap();
        }
        tokio::task::yield_now().await;
        let second = tokio::time::timeout(Duration::from_millis(200), mgr.get_session("example.com")).await;
        assert!(second.is_ok(), "permit must be freed when LeasedSession is dropped");
    }
}

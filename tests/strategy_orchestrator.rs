//! Integration tests for the `StrategyOrchestrator` (C4): scenarios 1 and 2
//! from spec.md §8, plus the `requiredStrategy` boundary behavior, driven
//! against mock HTTP/browser collaborators so nothing touches the network
//! or a real browser process.

use adaptive_scrape_engine::browser::driver::{ContextId, HeadlessBrowserDriver};
use adaptive_scrape_engine::browser::fingerprint::BrowserFingerprintSpec;
use adaptive_scrape_engine::browser::StealthSessionManager;
use adaptive_scrape_engine::http_client::{HttpClient, HttpResponse};
use adaptive_scrape_engine::models::{
    ProxyScheme, RetailerCategory, RetailerConfig, RetailerPriority, RetailerStatus,
};
use adaptive_scrape_engine::proxy::lb::NullLoadBalancerSink;
use adaptive_scrape_engine::proxy::store::InMemoryProxyStore;
use adaptive_scrape_engine::{ProxyPoolManager, RetailerRegistry, ScrapeError, StrategyOrchestrator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_retailer(required_strategy: Option<&str>) -> RetailerConfig {
    let mut selectors = HashMap::new();
    selectors.insert("title".to_string(), vec!["h1".to_string()]);
    selectors.insert("price".to_string(), vec![".price".to_string()]);
    selectors.insert("rating".to_string(), vec![".rating".to_string()]);
    selectors.insert("availability".to_string(), vec![".availability".to_string()]);
    selectors.insert("image".to_string(), vec!["img".to_string()]);
    selectors.insert("link".to_string(), vec!["a".to_string()]);

    RetailerConfig {
        key: "test-shop".to_string(),
        name: "Test Shop".to_string(),
        domain: "test-shop.example".to_string(),
        category: RetailerCategory::General,
        priority: RetailerPriority::High,
        selectors,
        search_url_template: "https://test-shop.example/s?q={query}&page={page}".to_string(),
        base_url: "https://test-shop.example".to_string(),
        rate_limit_secs: 0.0,
        timeout_secs: 30,
        max_retries: 3,
        requires_js: false,
        anti_bot_measures: true,
        anti_bot_indicators: vec!["captcha".to_string()],
        required_strategy: required_strategy.map(str::to_string),
        currency: "USD".to_string(),
        country: "US".to_string(),
        status: RetailerStatus::Active,
    }
}

/// Returns a fixed status/body on every call, counting how many times it was
/// invoked.
struct ScriptedHttpClient {
    status: u16,
    body: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn get(&self, _url: &str, _ua: &str, _proxy: Option<&str>) -> Result<HttpResponse, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse { status: self.status, body: self.body.to_string() })
    }
}

/// A `HeadlessBrowserDriver` that never touches a real browser — `content()`
/// always returns a fixture with a clean product page.
struct FixtureBrowserDriver {
    content: &'static str,
}

#[async_trait]
impl HeadlessBrowserDriver for FixtureBrowserDriver {
    async fn new_context(&self, _fp: &BrowserFingerprintSpec, _proxy: Option<&str>) -> Result<ContextId, ScrapeError> {
        Ok(ContextId(1))
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
        Ok(self.content.to_string())
    }

    async fn mouse_move(&self, _ctx: ContextId, _x: f64, _y: f64) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn close_context(&self, _ctx: ContextId) -> Result<(), ScrapeError> {
        Ok(())
    }
}

fn registry_with(retailer: RetailerConfig) -> Arc<RetailerRegistry> {
    let registry = RetailerRegistry::with_builtin_catalog();
    registry.add(retailer).unwrap();
    Arc::new(registry)
}

/// Scenario 1 (spec.md §8): healthy path via `simple_http` with a single
/// healthy proxy in the pool. The proxy's `success_rate` must rise.
#[tokio::test]
async fn scenario_1_healthy_path_via_simple_http() {
    let retailer = test_retailer(Some("simple_http"));
    let proxy_manager = Arc::new(ProxyPoolManager::new(
        Arc::new(InMemoryProxyStore::new()),
        Arc::new(NullLoadBalancerSink),
    ));
    proxy_manager.add_proxy("http://p1:8080", ProxyScheme::Http).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let http_client = Arc::new(ScriptedHttpClient {
        status: 200,
        body: r#"<html><body><h1>Bluetooth Speaker</h1><span class="price">$39.99</span></body></html>"#,
        calls: calls.clone(),
    });

    let session_manager = Arc::new(StealthSessionManager::new(
        Arc::new(FixtureBrowserDriver { content: "" }),
        1,
        Duration::from_millis(0),
    ));

    let orchestrator = StrategyOrchestrator::new(
        registry_with(retailer),
        proxy_manager.clone(),
        session_manager,
        http_client,
        None,
    );

    let result = orchestrator.scrape("https://test-shop.example/item/1").await;

    assert!(result.success);
    assert_eq!(result.method_used.as_deref(), Some("simple_http"));
    assert_eq!(result.proxy_used.as_deref(), Some("http://p1:8080"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let proxy = proxy_manager.all_proxies().await.into_iter().next().unwrap();
    assert!(proxy.success_rate > 0.5, "a successful outcome must raise success_rate above its 0.5 default");
}

/// Scenario 2 (spec.md §8): the first `simple_http` response trips the
/// retailer's anti-bot indicator, so the remaining retries on that strategy
/// are skipped and the orchestrator escalates straight to `stealth_browser`.
#[tokio::test]
async fn scenario_2_anti_bot_indicator_escalates_to_stealth_browser() {
    let retailer = test_retailer(Some("simple_http"));
    let proxy_manager = Arc::new(ProxyPoolManager::new(
        Arc::new(InMemoryProxyStore::new()),
        Arc::new(NullLoadBalancerSink),
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let http_client = Arc::new(ScriptedHttpClient {
        status: 200,
        body: "please solve this captcha to continue",
        calls: calls.clone(),
    });

    let session_manager = Arc::new(StealthSessionManager::new(
        Arc::new(FixtureBrowserDriver {
            content: r#"<html><body><h1>Bluetooth Speaker</h1><span class="price">$39.99</span></body></html>"#,
        }),
        1,
        Duration::from_millis(0),
    ));

    let orchestrator = StrategyOrchestrator::new(
        registry_with(retailer),
        proxy_manager,
        session_manager,
        http_client,
        None,
    );

    let result = orchestrator.scrape("https://test-shop.example/item/1").await;

    assert!(result.success);
    assert_eq!(result.method_used.as_deref(), Some("stealth_browser"));
    // the anti-bot hit short-circuits remaining simple_http retries: exactly
    // one HTTP call, not three.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.attempted_strategies, vec!["simple_http".to_string(), "stealth_browser".to_string()]);

    let simple_http_stat = orchestrator.strategy_stat("test-shop.example", "simple_http");
    assert_eq!(simple_http_stat.attempts, 1);
    assert_eq!(simple_http_stat.successes, 0);

    let stealth_stat = orchestrator.strategy_stat("test-shop.example", "stealth_browser");
    assert_eq!(stealth_stat.attempts, 1);
    assert_eq!(stealth_stat.successes, 1);
}

/// Boundary behavior (spec.md §8): a retailer with `requiredStrategy` set
/// always runs that strategy first, regardless of recorded stats.
#[tokio::test]
async fn required_strategy_is_always_tried_first() {
    let retailer = test_retailer(Some("stealth_browser"));
    let proxy_manager = Arc::new(ProxyPoolManager::new(
        Arc::new(InMemoryProxyStore::new()),
        Arc::new(NullLoadBalancerSink),
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let http_client = Arc::new(ScriptedHttpClient { status: 200, body: "", calls: calls.clone() });

    let session_manager = Arc::new(StealthSessionManager::new(
        Arc::new(FixtureBrowserDriver {
            content: r#"<html><body><h1>Desk Lamp</h1><span class="price">$19.99</span></body></html>"#,
        }),
        1,
        Duration::from_millis(0),
    ));

    let orchestrator = StrategyOrchestrator::new(
        registry_with(retailer),
        proxy_manager,
        session_manager,
        http_client,
        None,
    );

    let result = orchestrator.scrape("https://test-shop.example/item/1").await;

    assert!(result.success);
    assert_eq!(result.method_used.as_deref(), Some("stealth_browser"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "simple_http must never run when stealth_browser is pinned");
}

pub mod rate_limit;
pub mod stats;

use crate::browser::StealthSessionManager;
use crate::captcha::{detect_challenge, ChallengeSolverChain};
use crate::error::ScrapeError;
use crate::extract::{contains_anti_bot_indicator, extract_product, find_anti_bot_indicator};
use crate::http_client::{random_user_agent, HttpClient};
use crate::models::{RetailerCategory, RetailerConfig, RetailerPriority, RetailerStatus, ScrapingResult};
use crate::proxy::ProxyPoolManager;
use crate::retailer::RetailerRegistry;
use rand::Rng;
use rate_limit::DomainRateLimiter;
use stats::StrategyStatsTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// The four escalating strategies, in increasing cost order. `direct_api`
/// always reports not-supported (see DESIGN.md); the others are fully
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectApi,
    SimpleHttp,
    StealthBrowser,
    FullBrowser,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::DirectApi,
        Strategy::SimpleHttp,
        Strategy::StealthBrowser,
        Strategy::FullBrowser,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::DirectApi => "direct_api",
            Strategy::SimpleHttp => "simple_http",
            Strategy::StealthBrowser => "stealth_browser",
            Strategy::FullBrowser => "full_browser",
        }
    }

    pub fn priority(self) -> u32 {
        match self {
            Strategy::DirectApi => 1,
            Strategy::SimpleHttp => 2,
            Strategy::StealthBrowser => 3,
            Strategy::FullBrowser => 4,
        }
    }

    pub fn max_retries(self) -> u32 {
        3
    }

    pub fn timeout_secs(self) -> u64 {
        match self {
            Strategy::FullBrowser => 60,
            _ => 30,
        }
    }

    pub fn from_name(name: &str) -> Option<Strategy> {
        Self::ORDER.into_iter().find(|s| s.name() == name)
    }

    fn next(self) -> Option<Strategy> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

fn fallback_retailer_config(domain: &str) -> RetailerConfig {
    let mut selectors = HashMap::new();
    selectors.insert(
        "title".to_string(),
        vec!["h1".to_string(), ".product-title".to_string(), "[data-testid=\"product-title\"]".to_string()],
    );
    selectors.insert(
        "price".to_string(),
        vec![".price".to_string(), ".cost".to_string(), "[data-testid=\"price\"]".to_string()],
    );
    selectors.insert(
        "rating".to_string(),
        vec![".rating".to_string(), ".stars".to_string(), "[data-testid=\"rating\"]".to_string()],
    );
    selectors.insert("availability".to_string(), vec![".availability".to_string()]);
    selectors.insert("image".to_string(), vec!["img".to_string()]);
    selectors.insert("link".to_string(), vec!["a".to_string()]);

    RetailerConfig {
        key: "default".to_string(),
        name: "Unrecognized retailer".to_string(),
        domain: domain.to_string(),
        category: RetailerCategory::General,
        priority: RetailerPriority::Low,
        selectors,
        search_url_template: String::new(),
        base_url: format!("https://{domain}"),
        rate_limit_secs: 2.0,
        timeout_secs: 30,
        max_retries: 3,
        requires_js: false,
        anti_bot_measures: false,
        anti_bot_indicators: Vec::new(),
        required_strategy: None,
        currency: "USD".to_string(),
        country: "US".to_string(),
        status: RetailerStatus::Active,
    }
}

/// Coordinates the four scraping strategies across proxy, stealth-browser
/// and extraction collaborators, escalating on failure or anti-bot
/// detection and learning per-(domain, strategy) success rates over time.
pub struct StrategyOrchestrator {
    retailers: Arc<RetailerRegistry>,
    proxy_manager: Arc<ProxyPoolManager>,
    session_manager: Arc<StealthSessionManager>,
    http_client: Arc<dyn HttpClient>,
    captcha_chain: Option<Arc<ChallengeSolverChain>>,
    stats: StrategyStatsTable,
    rate_limiter: DomainRateLimiter,
}

impl StrategyOrchestrator {
    pub fn new(
        retailers: Arc<RetailerRegistry>,
        proxy_manager: Arc<ProxyPoolManager>,
        session_manager: Arc<StealthSessionManager>,
        http_client: Arc<dyn HttpClient>,
        captcha_chain: Option<Arc<ChallengeSolverChain>>,
    ) -> Self {
        Self {
            retailers,
            proxy_manager,
            session_manager,
            http_client,
            captcha_chain,
            stats: StrategyStatsTable::new(),
            rate_limiter: DomainRateLimiter::new(),
        }
    }

    /// Overrides the jitter range added on top of a domain's `rate_limit_secs`
    /// (default `(0.0, 0.5)`), sourced from `EngineConfig::request_jitter_range`.
    pub fn with_request_jitter_range(mut self, jitter_range: (f64, f64)) -> Self {
        self.rate_limiter = DomainRateLimiter::with_jitter_range(jitter_range);
        self
    }

    /// Exposes one `(domain, strategy)` learning entry, for admin tooling
    /// and tests; untested combinations return a zeroed `StrategyStat`.
    pub fn strategy_stat(&self, domain: &str, strategy: &str) -> crate::models::StrategyStat {
        self.stats.get(domain, strategy)
    }

    fn retailer_for(&self, domain: &str) -> RetailerConfig {
        let clean = domain.strip_prefix("www.").unwrap_or(domain);
        self.retailers
            .list_active(None, None)
            .into_iter()
            .find(|r| clean.contains(r.domain.as_str()))
            .unwrap_or_else(|| fallback_retailer_config(clean))
    }

    /// Picks the strategy to try first: the retailer's pinned
    /// `required_strategy` if set, otherwise the one with the highest
    /// `success_rate / priority` score (untested combos default to an
    /// optimistic 0.8).
    fn select_strategy(&self, domain: &str, retailer: &RetailerConfig) -> Strategy {
        if let Some(pinned) = retailer.required_strategy.as_deref().and_then(Strategy::from_name) {
            return pinned;
        }

        let mut best = Strategy::DirectApi;
        let mut best_score = -1.0;
        for strategy in Strategy::ORDER {
            let stat = self.stats.get(domain, strategy.name());
            let success_rate = if stat.attempts > 0 { stat.success_rate() } else { 0.8 };
            let score = success_rate / strategy.priority() as f64;
            if score > best_score {
                best_score = score;
                best = strategy;
            }
        }
        best
    }

    /// Runs `scrape` over every URL in `urls` with at most `max_concurrent`
    /// in flight at once, returning results in the same order as the input
    /// (spec.md §5's batch-API ordering + concurrency-cap guarantee).
    pub async fn scrape_batch(&self, urls: &[String], max_concurrent: usize) -> Vec<ScrapingResult> {
        use futures::stream::StreamExt;

        let mut results: Vec<(usize, ScrapingResult)> = futures::stream::iter(urls.iter().enumerate())
            .map(|(idx, url)| async move { (idx, self.scrape(url).await) })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Top-level entry point: resolves the retailer, selects a strategy,
    /// executes with retry + escalation, records learning stats, and
    /// extracts product data on success.
    pub async fn scrape(&self, url: &str) -> ScrapingResult {
        let started = Instant::now();
        let domain = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
            Some(d) => d,
            None => return ScrapingResult::failure("invalid URL"),
        };

        let retailer = self.retailer_for(&domain);
        let strategy = self.select_strategy(&domain, &retailer);

        info!(url, strategy = strategy.name(), "scraping with selected strategy");

        let mut result = self.execute_strategy(url, strategy, &retailer, Vec::new()).await;
        result.response_time_sec = started.elapsed().as_secs_f64();
        result
    }

    /// Runs `strategy`'s retry loop; on exhaustion (or an immediate
    /// anti-bot hit) escalates to the next strategy. `trail` accumulates the
    /// strategies attempted so far across the recursive escalation chain.
    /// Boxed because the escalation call is itself recursive — an `async
    /// fn` can't call itself directly without an unbounded-size future.
    fn execute_strategy<'a>(
        &'a self,
        url: &'a str,
        strategy: Strategy,
        retailer: &'a RetailerConfig,
        trail: Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ScrapingResult> + Send + 'a>> {
        Box::pin(self.execute_strategy_inner(url, strategy, retailer, trail))
    }

    async fn execute_strategy_inner(
        &self,
        url: &str,
        strategy: Strategy,
        retailer: &RetailerConfig,
        mut trail: Vec<String>,
    ) -> ScrapingResult {
        trail.push(strategy.name().to_string());
        let domain = retailer.domain.clone();
        let min_delay = Duration::from_secs_f64(retailer.rate_limit_secs);

        for retry in 0..strategy.max_retries() {
            self.rate_limiter.wait(&domain, min_delay).await;
            let attempt_started = Instant::now();
            let outcome = match strategy {
                Strategy::DirectApi => self.scrape_direct_api(url).await,
                Strategy::SimpleHttp => self.scrape_simple_http(url, retailer).await,
                Strategy::StealthBrowser => self.scrape_stealth_browser(url, retailer).await,
                Strategy::FullBrowser => self.scrape_full_browser(url, retailer).await,
            };
            let latency = attempt_started.elapsed().as_secs_f64();

            let mut outcome = outcome;
            outcome.method_used = Some(strategy.name().to_string());
            outcome.retry_count = retry;
            outcome.attempted_strategies = trail.clone();

            self.stats.record(&domain, strategy.name(), outcome.success, latency);

            if outcome.success {
                return outcome;
            }

            let anti_bot_hit = outcome
                .error
                .as_deref()
                .map(|e| contains_anti_bot_indicator(e, &retailer.anti_bot_indicators))
                .unwrap_or(false);

            if anti_bot_hit {
                warn!(domain, strategy = strategy.name(), "anti-bot detection, escalating");
                break;
            }

            if retry < strategy.max_retries() - 1 {
                let backoff = 2u64.pow(retry) as f64 + rand::thread_rng().gen_range(1.0..3.0);
                tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
            }
        }

        match strategy.next() {
            Some(next) => {
                info!(domain, from = strategy.name(), to = next.name(), "escalating strategy");
                self.execute_strategy(url, next, retailer, trail).await
            }
            None => {
                let mut failure = ScrapingResult::failure("all strategies failed");
                failure.method_used = Some(strategy.name().to_string());
                failure.attempted_strategies = trail;
                failure
            }
        }
    }

    /// Deliberately unimplemented: no retailer in the built-in catalog
    /// declares a concrete first-party API contract.
    async fn scrape_direct_api(&self, _url: &str) -> ScrapingResult {
        ScrapingResult::failure("direct API not available for this site")
    }

    async fn scrape_simple_http(&self, url: &str, retailer: &RetailerConfig) -> ScrapingResult {
        let proxy = self.proxy_manager.get_best_proxy().await;
        let user_agent = random_user_agent();

        let response = match self
            .http_client
            .get(url, user_agent, proxy.as_ref().map(|p| p.url.as_str()))
            .await
        {
            Ok(r) => r,
            Err(e) => return ScrapingResult::failure(e.to_string()),
        };

        if let Some(p) = &proxy {
            self.proxy_manager
                .report_outcome(&p.url, response.status == 200, 0.0)
                .await;
        }

        if response.status != 200 {
            return ScrapingResult::failure(format!("HTTP {}", response.status));
        }

        if let Some(indicator) = find_anti_bot_indicator(&response.body, &retailer.anti_bot_indicators) {
            return ScrapingResult::failure(ScrapeError::AntiBotDetected(indicator.to_string()).to_string());
        }

        match extract_product(&response.body, retailer, url) {
            Some(data) => {
                let mut result = ScrapingResult::failure("unreachable");
                result.success = true;
                result.error = None;
                result.proxy_used = proxy.map(|p| p.url);
                result.data = Some(data);
                result
            }
            None => ScrapingResult::failure("no product data found in response"),
        }
    }

    async fn scrape_stealth_browser(&self, url: &str, retailer: &RetailerConfig) -> ScrapingResult {
        let leased = match self.session_manager.get_session(&retailer.domain).await {
            Ok(s) => s,
            Err(e) => return ScrapingResult::failure(e.to_string()),
        };

        if let Err(e) = self.session_manager.navigate_with_stealth(&leased, url).await {
            let _ = leased.release().await;
            return ScrapingResult::failure(e.to_string());
        }

        let mut content = match self.session_manager.extract_content(&leased).await {
            Ok(c) => c,
            Err(e) => {
                let _ = leased.release().await;
                return ScrapingResult::failure(e.to_string());
            }
        };

        let mut captcha_solved = false;
        if detect_challenge(&content) {
            if let Some(chain) = &self.captcha_chain {
                match chain.solve(leased.session.context_id).await {
                    Ok(solved) => captcha_solved = solved,
                    Err(e) => {
                        let _ = leased.release().await;
                        return ScrapingResult::failure(e.to_string());
                    }
                }
                content = match self.session_manager.extract_content(&leased).await {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = leased.release().await;
                        return ScrapingResult::failure(e.to_string());
                    }
                };
            }
        }

        let proxy_used = leased.session.proxy.clone();
        let _ = leased.release().await;

        if let Some(indicator) = find_anti_bot_indicator(&content, &retailer.anti_bot_indicators) {
            return ScrapingResult::failure(ScrapeError::AntiBotDetected(indicator.to_string()).to_string());
        }

        match extract_product(&content, retailer, url) {
            Some(data) => ScrapingResult {
                success: true,
                method_used: None,
                proxy_used,
                captcha_solved,
                response_time_sec: 0.0,
                retry_count: 0,
                error: None,
                data: Some(data),
                attempted_strategies: Vec::new(),
            },
            None => ScrapingResult::failure("no product data found on rendered page"),
        }
    }

    /// `full_browser` is the same stealth-session pipeline with the longer
    /// timeout baked into `Strategy::timeout_secs` — it exists as a distinct
    /// escalation rung, not a distinct code path, matching the original's
    /// treatment of the two as separate `ScrapingStrategy` entries sharing
    /// nearly identical execution.
    async fn scrape_full_browser(&self, url: &str, retailer: &RetailerConfig) -> ScrapingResult {
        self.scrape_stealth_browser(url, retailer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_order_is_cost_increasing() {
        let priorities: Vec<u32> = Strategy::ORDER.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
    }

    #[test]
    fn from_name_round_trips() {
        for s in Strategy::ORDER {
            assert_eq!(Strategy::from_name(s.name()), Some(s));
        }
    }

    #[test]
    fn next_is_none_for_full_browser() {
        assert_eq!(Strategy::FullBrowser.next(), None);
    }

    #[test]
    fn fallback_retailer_has_generic_selectors() {
        let r = fallback_retailer_config("unknown-shop.example");
        assert!(r.selectors.contains_key("title"));
        assert_eq!(r.priority, RetailerPriority::Low);
    }
}

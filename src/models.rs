use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level grouping used to filter the retailer catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetailerCategory {
    General,
    Electronics,
    Fashion,
    HomeImprovement,
    Wholesale,
    Specialty,
}

/// High priority retailers are scraped first and win the tie-break in the
/// orchestrator's priority-tier scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetailerPriority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl RetailerPriority {
    pub fn tier(self) -> f64 {
        self as u8 as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetailerStatus {
    Active,
    Inactive,
    Maintenance,
}

/// Immutable per-retailer configuration, owned by the `RetailerRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerConfig {
    pub key: String,
    pub name: String,
    pub domain: String,
    pub category: RetailerCategory,
    pub priority: RetailerPriority,
    /// Ordered fallback selectors per field; the extractor tries each in
    /// order until one matches a non-empty value.
    pub selectors: HashMap<String, Vec<String>>,
    pub search_url_template: String,
    pub base_url: String,
    /// Minimum seconds between requests to this retailer's domain.
    pub rate_limit_secs: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub requires_js: bool,
    pub anti_bot_measures: bool,
    /// Known substrings that indicate the site has detected the client.
    pub anti_bot_indicators: Vec<String>,
    /// If set, the orchestrator always starts with this strategy regardless
    /// of recorded stats.
    pub required_strategy: Option<String>,
    pub currency: String,
    pub country: String,
    pub status: RetailerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks5,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

/// Owned by the Proxy Pool Manager; mutated only by health checks and
/// outcome reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub url: String,
    pub scheme: ProxyScheme,
    pub credentials: Option<ProxyCredentials>,
    pub country: Option<String>,
    pub latency_ewma_secs: f64,
    pub success_rate: f64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub active: bool,
}

impl ProxyEntry {
    pub fn new(url: impl Into<String>, scheme: ProxyScheme) -> Self {
        Self {
            url: url.into(),
            scheme,
            credentials: None,
            country: None,
            latency_ewma_secs: 1.0,
            success_rate: 0.5,
            last_checked_at: None,
            consecutive_failures: 0,
            active: true,
        }
    }

    /// `successRate / (latency + 1)`.
    pub fn health_score(&self) -> f64 {
        self.success_rate / (self.latency_ewma_secs + 1.0)
    }
}

/// A snapshot of browser attributes drawn at session-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserFingerprint {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub screen: (u32, u32),
    pub timezone: String,
    pub locale: String,
    pub platform: String,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
}

/// A leased browser context. Identifies a driver-level context via
/// `context_id`; the heavyweight browser handle itself lives behind the
/// `HeadlessBrowserDriver` so sessions stay cheap to pass around.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub id: uuid::Uuid,
    pub context_id: crate::browser::driver::ContextId,
    pub fingerprint: BrowserFingerprint,
    pub proxy: Option<String>,
    pub domain: String,
    pub created_at: std::time::Instant,
}

/// Keyed by `(domain, strategy)`; in-memory bookkeeping for the
/// orchestrator's learning loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyStat {
    pub attempts: u64,
    pub successes: u64,
    pub avg_latency_secs: f64,
    pub last_outcome_at: Option<DateTime<Utc>>,
}

impl StrategyStat {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Extractor output — one scraped listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub rating: Option<f32>,
    pub availability: Option<String>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub source_url: String,
    pub retailer_key: String,
    pub extracted_at: DateTime<Utc>,
    /// Optional USD conversion hook; `None` unless a caller opts in.
    pub currency_conversion_usd: Option<f64>,
    /// Internal dedup key, never surfaced as a product field.
    #[serde(skip)]
    pub raw_html_hash: Option<String>,
}

/// Outcome of one `scrape(url)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingResult {
    pub success: bool,
    pub method_used: Option<String>,
    pub proxy_used: Option<String>,
    pub captcha_solved: bool,
    pub response_time_sec: f64,
    pub retry_count: u32,
    pub error: Option<String>,
    pub data: Option<ProductRecord>,
    /// Escalation trail: every strategy name attempted, in order.
    pub attempted_strategies: Vec<String>,
}

impl ScrapingResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            method_used: None,
            proxy_used: None,
            captcha_solved: false,
            response_time_sec: 0.0,
            retry_count: 0,
            error: Some(error.into()),
            data: None,
            attempted_strategies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyPoolStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub avg_latency_secs: f64,
    pub avg_success_rate: f64,
}

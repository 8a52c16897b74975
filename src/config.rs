use std::time::Duration;

/// Process-wide configuration, as listed in spec.md §6.
///
/// Every field has the documented default; `EngineConfig::from_env` overlays
/// environment variables on top of those defaults, falling back silently to
/// the default on a missing or unparseable variable (a malformed override is
/// a configuration error only when it would leave the engine in an
/// inconsistent state, e.g. a non-numeric retailer catalog path).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrent_sessions: usize,
    pub health_interval: Duration,
    pub discovery_interval: Duration,
    pub f_max: u32,
    pub per_domain_min_delay: Duration,
    pub request_jitter_range: (f64, f64),
    pub browser_headless: bool,
    pub browser_timeout: Duration,
    pub retailer_catalog_path: Option<String>,
    pub proxy_discovery_urls: Vec<String>,
    pub health_check_batch_size: usize,
    pub max_new_proxies_per_discovery: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            health_interval: Duration::from_secs(60),
            discovery_interval: Duration::from_secs(3600),
            f_max: 3,
            per_domain_min_delay: Duration::from_secs_f64(2.0),
            request_jitter_range: (0.5, 3.0),
            browser_headless: true,
            browser_timeout: Duration::from_secs(30),
            retailer_catalog_path: None,
            proxy_discovery_urls: Vec::new(),
            health_check_batch_size: 10,
            max_new_proxies_per_discovery: 50,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("MAX_CONCURRENT_SESSIONS") {
            cfg.max_concurrent_sessions = v;
        }
        if let Some(v) = env_u64("HEALTH_INTERVAL_SECONDS") {
            cfg.health_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("DISCOVERY_INTERVAL_SECONDS") {
            cfg.discovery_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_u32("F_MAX") {
            cfg.f_max = v;
        }
        if let Some(v) = env_f64("PER_DOMAIN_MIN_DELAY_SECONDS") {
            cfg.per_domain_min_delay = Duration::from_secs_f64(v);
        }
        if let Ok(v) = std::env::var("REQUEST_JITTER_RANGE_SECONDS") {
            if let Some((low, high)) = v.split_once(',') {
                if let (Ok(low), Ok(high)) = (low.trim().parse(), high.trim().parse()) {
                    cfg.request_jitter_range = (low, high);
                }
            }
        }
        if let Ok(v) = std::env::var("BROWSER_HEADLESS") {
            cfg.browser_headless = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = env_u64("BROWSER_TIMEOUT_SECONDS") {
            cfg.browser_timeout = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("RETAILER_CATALOG_PATH") {
            if !v.is_empty() {
                cfg.retailer_catalog_path = Some(v);
            }
        }
        if let Ok(v) = std::env::var("PROXY_DISCOVERY_URLS") {
            cfg.proxy_discovery_urls = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

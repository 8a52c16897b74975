//! HTTP client abstraction used by the `simple_http` strategy. Kept behind a
//! trait (instead of calling `reqwest::Client` directly from the
//! orchestrator) so tests can substitute a `wiremock`-backed client without
//! touching the network.

use crate::error::ScrapeError;
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(
        &self,
        url: &str,
        user_agent: &str,
        proxy: Option<&str>,
    ) -> Result<HttpResponse, ScrapeError>;
}

/// Realistic browser-like header set, carried over from the original's
/// `_scrape_simple_http`.
pub struct ReqwestHttpClient {
    timeout: Duration,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(
        &self,
        url: &str,
        user_agent: &str,
        proxy: Option<&str>,
    ) -> Result<HttpResponse, ScrapeError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ScrapeError::Configuration(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(ScrapeError::from)?;

        let response = client
            .get(url)
            .header("User-Agent", user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("Accept-Encoding", "gzip, deflate")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(ScrapeError::from)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(ScrapeError::from)?;
        Ok(HttpResponse { status, body })
    }
}

/// Rotating pool of realistic desktop user agents.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    use rand::seq::SliceRandom;
    USER_AGENTS.choose(&mut rand::thread_rng()).expect("non-empty")
}

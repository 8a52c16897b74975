//! Upstream load-balancer publication: renders the healthy portion of the
//! proxy pool as an HAProxy-style backend stanza and hands it to a sink for
//! validation + reload.

use crate::models::ProxyEntry;
use async_trait::async_trait;

/// A destination for the rendered backend document — e.g. writing
/// `/etc/haproxy/haproxy.cfg` and reloading the service. The default
/// implementation just buffers the text for inspection.
#[async_trait]
pub trait LoadBalancerSink: Send + Sync {
    async fn publish(&self, document: &str) -> Result<(), crate::error::ScrapeError>;
}

pub struct NullLoadBalancerSink;

#[async_trait]
impl LoadBalancerSink for NullLoadBalancerSink {
    async fn publish(&self, _document: &str) -> Result<(), crate::error::ScrapeError> {
        Ok(())
    }
}

fn strip_scheme(url: &str) -> &str {
    url.trim_start_matches("https://").trim_start_matches("http://")
}

/// Builds the `backend proxy_pool` stanza: active proxies with
/// `success_rate > 0.3`, marking `success_rate < 0.7` as `backup`.
pub fn build_upstream_document(pool: &[ProxyEntry]) -> String {
    let healthy: Vec<&ProxyEntry> = pool
        .iter()
        .filter(|p| p.active && p.success_rate > 0.3)
        .collect();

    let mut lines = vec![
        "backend proxy_pool".to_string(),
        "    balance roundrobin".to_string(),
        "    option httpchk GET /".to_string(),
    ];

    for (i, proxy) in healthy.iter().enumerate() {
        let server_name = format!("proxy{}", i + 1);
        let host = strip_scheme(&proxy.url);
        let mut line = format!("    server {server_name} {host} check");
        if proxy.success_rate < 0.7 {
            line.push_str(" backup");
        }
        lines.push(line);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyScheme;

    fn proxy(url: &str, active: bool, success_rate: f64) -> ProxyEntry {
        let mut p = ProxyEntry::new(url, ProxyScheme::Http);
        p.active = active;
        p.success_rate = success_rate;
        p
    }

    #[test]
    fn excludes_inactive_and_low_success_proxies() {
        let pool = vec![
            proxy("http://good:8080", true, 0.9),
            proxy("http://bad:8080", true, 0.1),
            proxy("http://inactive:8080", false, 0.9),
        ];
        let doc = build_upstream_document(&pool);
        assert!(doc.contains("good:8080"));
        assert!(!doc.contains("bad:8080"));
        assert!(!doc.contains("inactive:8080"));
    }

    #[test]
    fn marks_sub_0_7_success_rate_as_backup() {
        let pool = vec![proxy("http://shaky:8080", true, 0.5)];
        let doc = build_upstream_document(&pool);
        assert!(doc.contains("backup"));
    }

    #[test]
    fn high_success_rate_is_not_backup() {
        let pool = vec![proxy("http://solid:8080", true, 0.95)];
        let doc = build_upstream_document(&pool);
        assert!(!doc.contains("backup"));
    }
}

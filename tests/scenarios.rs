//! Property-based tests for the invariants spec.md §8 calls out directly:
//! the proxy EWMA/deactivation invariant and `buildSearchURLs`'s
//! exactly-n-distinct-pages guarantee.

use adaptive_scrape_engine::models::ProxyScheme;
use adaptive_scrape_engine::proxy::lb::NullLoadBalancerSink;
use adaptive_scrape_engine::proxy::store::InMemoryProxyStore;
use adaptive_scrape_engine::{ProxyPoolManager, RetailerRegistry};
use proptest::prelude::*;
use std::sync::Arc;

const F_MAX: u32 = 3;

proptest! {
    /// For any sequence of `report_outcome` calls, `success_rate` stays in
    /// `[0, 1]`, and `active` is false whenever `consecutive_failures` has
    /// reached `F_MAX`.
    #[test]
    fn proxy_success_rate_stays_in_unit_bounds(outcomes in prop::collection::vec(any::<bool>(), 1..200)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let mgr = ProxyPoolManager::new(
                Arc::new(InMemoryProxyStore::new()),
                Arc::new(NullLoadBalancerSink),
            );
            mgr.add_proxy("http://p:1", ProxyScheme::Http).await;

            for outcome in outcomes {
                mgr.report_outcome("http://p:1", outcome, 0.2).await;
                let entry = mgr.all_proxies().await.into_iter().next().unwrap();
                prop_assert!(entry.success_rate >= 0.0 && entry.success_rate <= 1.0);
                prop_assert!(entry.consecutive_failures < F_MAX || !entry.active);
            }
            Ok(())
        })?;
    }

    /// `buildSearchURLs(key, q, n)` returns exactly `n` URLs, one per page
    /// `1..=n`, each carrying the sanitized query.
    #[test]
    fn build_search_urls_returns_n_distinct_pages(
        raw_query in "[a-zA-Z0-9 ]{1,40}",
        pages in 1u32..8,
    ) {
        let registry = RetailerRegistry::with_builtin_catalog();
        let urls = registry.build_search_urls("amazon", &raw_query, pages);

        prop_assert_eq!(urls.len(), pages as usize);

        let unique: std::collections::HashSet<&String> = urls.iter().collect();
        prop_assert_eq!(unique.len(), urls.len(), "all returned URLs must be distinct");

        for (i, url) in urls.iter().enumerate() {
            let expected_page = i + 1;
            prop_assert!(url.ends_with(&format!("ref=sr_pg_{expected_page}")));
        }
    }
}

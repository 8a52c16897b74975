//! Persistence abstraction for the proxy pool. Mirrors the Redis hash/set
//! commands the original proxy service used (`hset`/`hget`/`sadd`/
//! `smembers`), so a Redis-backed implementation is a near-mechanical
//! translation; the default implementation keeps everything in memory.

use crate::models::ProxyEntry;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait ProxyStateStore: Send + Sync {
    async fn sadd(&self, url: &str);
    async fn smembers(&self) -> Vec<String>;
    async fn hset(&self, url: &str, entry: ProxyEntry);
    async fn hget(&self, url: &str) -> Option<ProxyEntry>;
    async fn hdel(&self, url: &str);
    async fn hexists(&self, url: &str) -> bool;
}

#[derive(Default)]
pub struct InMemoryProxyStore {
    urls: RwLock<Vec<String>>,
    entries: RwLock<HashMap<String, ProxyEntry>>,
}

impl InMemoryProxyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProxyStateStore for InMemoryProxyStore {
    async fn sadd(&self, url: &str) {
        let mut urls = self.urls.write();
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }

    async fn smembers(&self) -> Vec<String> {
        self.urls.read().clone()
    }

    async fn hset(&self, url: &str, entry: ProxyEntry) {
        self.entries.write().insert(url.to_string(), entry);
    }

    async fn hget(&self, url: &str) -> Option<ProxyEntry> {
        self.entries.read().get(url).cloned()
    }

    async fn hdel(&self, url: &str) {
        self.entries.write().remove(url);
        self.urls.write().retain(|u| u != url);
    }

    async fn hexists(&self, url: &str) -> bool {
        self.entries.read().contains_key(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyScheme;

    #[tokio::test]
    async fn sadd_is_idempotent() {
        let store = InMemoryProxyStore::new();
        store.sadd("http://p1").await;
        store.sadd("http://p1").await;
        assert_eq!(store.smembers().await.len(), 1);
    }

    #[tokio::test]
    async fn hset_then_hget_round_trips() {
        let store = InMemoryProxyStore::new();
        let entry = ProxyEntry::new("http://p1", ProxyScheme::Http);
        store.hset("http://p1", entry.clone()).await;
        let got = store.hget("http://p1").await.unwrap();
        assert_eq!(got.url, entry.url);
    }

    #[tokio::test]
    async fn hdel_removes_from_both_maps() {
        let store = InMemoryProxyStore::new();
        store.sadd("http://p1").await;
        store.hset("http://p1", ProxyEntry::new("http://p1", ProxyScheme::Http)).await;
        store.hdel("http://p1").await;
        assert!(store.smembers().await.is_empty());
        assert!(!store.hexists("http://p1").await);
    }
}

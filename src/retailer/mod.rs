pub mod catalog;

use crate::error::ScrapeError;
use crate::models::{RetailerCategory, RetailerConfig, RetailerPriority, RetailerStatus};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Export/import shape for `RetailerRegistry::export_all`/`import_all`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RetailerCatalogDocument {
    pub retailers: HashMap<String, RetailerConfig>,
    pub version: String,
}

/// Owns the set of known retailers and their live status. Reads are lock-free
/// snapshots over a `parking_lot::RwLock`, matching the teacher's
/// shared-state convention for small, frequently-read maps.
pub struct RetailerRegistry {
    retailers: RwLock<HashMap<String, RetailerConfig>>,
}

impl RetailerRegistry {
    /// Loads the built-in catalog. If `catalog_path` is set, the file is
    /// read instead; a malformed document is a configuration error, never a
    /// panic.
    pub fn load(catalog_path: Option<&str>) -> Result<Self, ScrapeError> {
        let retailers = match catalog_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| ScrapeError::Configuration(format!("reading {path}: {e}")))?;
                let doc: RetailerCatalogDocument = serde_json::from_str(&raw)
                    .map_err(|e| ScrapeError::Configuration(format!("parsing {path}: {e}")))?;
                doc.retailers
            }
            None => catalog::seed_catalog()
                .into_iter()
                .map(|r| (r.key.clone(), r))
                .collect(),
        };
        info!(count = retailers.len(), "initialized retailer registry");
        Ok(Self {
            retailers: RwLock::new(retailers),
        })
    }

    pub fn with_builtin_catalog() -> Self {
        Self::load(None).expect("built-in catalog is always well-formed")
    }

    pub fn get(&self, key: &str) -> Option<RetailerConfig> {
        self.retailers.read().get(key).cloned()
    }

    /// Retailers with `status == Active`, optionally filtered, sorted by
    /// priority (high first).
    pub fn list_active(
        &self,
        category: Option<RetailerCategory>,
        priority: Option<RetailerPriority>,
    ) -> Vec<RetailerConfig> {
        let mut out: Vec<RetailerConfig> = self
            .retailers
            .read()
            .values()
            .filter(|r| r.status == RetailerStatus::Active)
            .filter(|r| category.map_or(true, |c| r.category == c))
            .filter(|r| priority.map_or(true, |p| r.priority == p))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.priority);
        out
    }

    /// Adds a new retailer. Errors if `config.key` already names a retailer —
    /// use `set_status`/re-`import_all` to modify an existing one.
    pub fn add(&self, config: RetailerConfig) -> Result<(), ScrapeError> {
        let key = config.key.clone();
        let mut guard = self.retailers.write();
        if guard.contains_key(&key) {
            return Err(ScrapeError::Configuration(format!("retailer '{key}' already exists")));
        }
        guard.insert(key.clone(), config);
        drop(guard);
        info!(retailer = %key, "added retailer");
        Ok(())
    }

    pub fn set_status(&self, key: &str, status: RetailerStatus) -> bool {
        let mut guard = self.retailers.write();
        match guard.get_mut(key) {
            Some(r) => {
                r.status = status;
                info!(retailer = %key, ?status, "updated retailer status");
                true
            }
            None => {
                warn!(retailer = %key, "set_status on unknown retailer");
                false
            }
        }
    }

    /// Sanitizes `query` (strips everything but word chars/whitespace/hyphen,
    /// then collapses spaces to `+`) and expands `search_url_template` for
    /// `pages` 1..=pages.
    pub fn build_search_urls(&self, key: &str, query: &str, pages: u32) -> Vec<String> {
        let Some(config) = self.get(key) else {
            return Vec::new();
        };

        let clean_query = sanitize_query(query);
        let mut urls = Vec::with_capacity(pages as usize);
        for page in 1..=pages.max(1) {
            let url = config
                .search_url_template
                .replace("{query}", &clean_query)
                .replace("{page}", &page.to_string());
            urls.push(url);
        }
        urls
    }

    pub fn export_all(&self) -> RetailerCatalogDocument {
        RetailerCatalogDocument {
            retailers: self.retailers.read().clone(),
            version: "1.0".to_string(),
        }
    }

    pub fn import_all(&self, doc: RetailerCatalogDocument) {
        *self.retailers.write() = doc.retailers;
    }
}

fn sanitize_query(query: &str) -> String {
    static NON_WORD: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
    static WHITESPACE: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"\s+").unwrap());
    let stripped = NON_WORD.replace_all(query, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    collapsed.replace(' ', "+")
}

pub type SharedRetailerRegistry = Arc<RetailerRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetailerStatus;

    #[test]
    fn build_search_urls_sanitizes_and_paginates() {
        let reg = RetailerRegistry::with_builtin_catalog();
        let urls = reg.build_search_urls("amazon", "wireless mouse!!", 2);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("wireless+mouse"));
        assert!(urls[0].ends_with("ref=sr_pg_1"));
        assert!(urls[1].ends_with("ref=sr_pg_2"));
    }

    #[test]
    fn build_search_urls_on_unknown_retailer_is_empty() {
        let reg = RetailerRegistry::with_builtin_catalog();
        assert!(reg.build_search_urls("not-a-retailer", "x", 1).is_empty());
    }

    #[test]
    fn list_active_sorts_high_priority_first() {
        let reg = RetailerRegistry::with_builtin_catalog();
        let active = reg.list_active(None, None);
        let priorities: Vec<RetailerPriority> = active.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert_eq!(priorities.first(), Some(&RetailerPriority::High));
    }

    #[test]
    fn list_active_excludes_inactive() {
        let reg = RetailerRegistry::with_builtin_catalog();
        reg.set_status("nordstrom", RetailerStatus::Inactive);
        let active = reg.list_active(None, None);
        assert!(!active.iter().any(|r| r.key == "nordstrom"));
    }

    #[test]
    fn add_rejects_a_duplicate_key() {
        let reg = RetailerRegistry::with_builtin_catalog();
        let dup = reg.get("amazon").unwrap();
        assert!(reg.add(dup).is_err());
    }

    #[test]
    fn export_import_round_trips() {
        let reg = RetailerRegistry::with_builtin_catalog();
        let doc = reg.export_all();
        let reg2 = RetailerRegistry::with_builtin_catalog();
        reg2.import_all(doc);
        assert_eq!(
            reg2.list_active(None, None).len(),
            reg.list_active(None, None).len()
        );
    }
}

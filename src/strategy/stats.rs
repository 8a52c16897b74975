//! Per-(domain, strategy) learning stats the orchestrator consults when
//! choosing a strategy for a retailer that has no `required_strategy` pin.

use crate::models::StrategyStat;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct StrategyStatsTable {
    inner: RwLock<HashMap<(String, String), StrategyStat>>,
}

impl StrategyStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str, strategy: &str) -> StrategyStat {
        self.inner
            .read()
            .get(&(domain.to_string(), strategy.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn record(&self, domain: &str, strategy: &str, success: bool, latency_secs: f64) {
        let mut guard = self.inner.write();
        let entry = guard
            .entry((domain.to_string(), strategy.to_string()))
            .or_default();
        entry.attempts += 1;
        if success {
            entry.successes += 1;
        }
        let n = entry.attempts as f64;
        entry.avg_latency_secs += (latency_secs - entry.avg_latency_secs) / n;
        entry.last_outcome_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_combo_has_zero_attempts() {
        let table = StrategyStatsTable::new();
        let stat = table.get("amazon.com", "simple_http");
        assert_eq!(stat.attempts, 0);
        assert_eq!(stat.success_rate(), 0.0);
    }

    #[test]
    fn records_accumulate_and_average_latency() {
        let table = StrategyStatsTable::new();
        table.record("amazon.com", "simple_http", true, 1.0);
        table.record("amazon.com", "simple_http", false, 3.0);
        let stat = table.get("amazon.com", "simple_http");
        assert_eq!(stat.attempts, 2);
        assert_eq!(stat.successes, 1);
        assert_eq!(stat.avg_latency_secs, 2.0);
    }
}

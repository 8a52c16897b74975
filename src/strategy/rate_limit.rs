//! Per-domain minimum delay enforcement, shared by every strategy so the
//! `rateLimit(D)` invariant holds regardless of which strategy a given
//! attempt uses.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct DomainRateLimiter {
    last_request_at: Mutex<HashMap<String, Instant>>,
    jitter_range: (f64, f64),
}

impl Default for DomainRateLimiter {
    fn default() -> Self {
        Self::with_jitter_range((0.0, 0.5))
    }
}

impl DomainRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jitter_range(jitter_range: (f64, f64)) -> Self {
        Self {
            last_request_at: Mutex::new(HashMap::new()),
            jitter_range,
        }
    }

    /// Blocks until at least `min_delay` has elapsed since the last request
    /// to `domain`, adding a small jitter on top so requests don't line up
    /// in lockstep.
    pub async fn wait(&self, domain: &str, min_delay: Duration) {
        let wait = {
            let mut last = self.last_request_at.lock();
            let now = Instant::now();
            let elapsed = last
                .get(domain)
                .map(|t| now.duration_since(*t))
                .unwrap_or(Duration::MAX);

            let wait = if elapsed < min_delay {
                let (low, high) = self.jitter_range;
                let jitter = rand::thread_rng().gen_range(low..high);
                Some(min_delay - elapsed + Duration::from_secs_f64(jitter))
            } else {
                None
            };
            last.insert(domain.to_string(), now + wait.unwrap_or(Duration::ZERO));
            wait
        };

        if let Some(delay) = wait {
            tokio::time::sleep(delay).await;
        }
    }
}

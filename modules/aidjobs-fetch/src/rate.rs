use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default request budget per host.
const DEFAULT_REQUESTS_PER_MINUTE: f64 = 30.0;
const DEFAULT_BURST: f64 = 5.0;

/// Token bucket with monotonic-clock refill.
///
/// Capacity equals the allowed burst; tokens refill at
/// requests-per-minute / 60 per second.
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: f64, burst: f64) -> Self {
        Self {
            capacity: burst,
            tokens: burst,
            refill_per_sec: requests_per_minute / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Time to wait before a token is available. Consumes the token
    /// immediately; the caller sleeps for the returned duration.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            self.tokens = 0.0;
            Duration::from_secs_f64(deficit / self.refill_per_sec)
        }
    }
}

/// Registry of per-host token buckets. The outer map lock is held only for
/// the lookup; waits happen against the host's own bucket.
pub struct HostLimiters {
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    requests_per_minute: f64,
    burst: f64,
}

impl HostLimiters {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_BURST)
    }

    pub fn with_budget(requests_per_minute: f64, burst: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            requests_per_minute,
            burst,
        }
    }

    /// Wait until the host's bucket grants a slot. A robots crawl-delay
    /// overrides the bucket wait when longer.
    pub async fn wait_for_slot(&self, host: &str, crawl_delay: Option<Duration>) {
        let bucket = {
            let mut buckets = self.buckets.lock().await;
            buckets
                .entry(host.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(TokenBucket::new(
                        self.requests_per_minute,
                        self.burst,
                    )))
                })
                .clone()
        };

        let mut wait = {
            let mut bucket = bucket.lock().await;
            bucket.reserve(Instant::now())
        };

        if let Some(delay) = crawl_delay {
            wait = wait.max(delay);
        }

        if !wait.is_zero() {
            debug!(host, wait_ms = wait.as_millis() as u64, "Rate limit wait");
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for HostLimiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_wait() {
        let mut bucket = TokenBucket::new(60.0, 3.0);
        let now = Instant::now();

        // Burst of 3 goes straight through.
        assert_eq!(bucket.reserve(now), Duration::ZERO);
        assert_eq!(bucket.reserve(now), Duration::ZERO);
        assert_eq!(bucket.reserve(now), Duration::ZERO);

        // Fourth call waits roughly one refill interval (1 token/sec).
        let wait = bucket.reserve(now);
        assert!(wait > Duration::from_millis(900) && wait <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_restores_tokens() {
        let mut bucket = TokenBucket::new(60.0, 1.0);
        let start = Instant::now();
        assert_eq!(bucket.reserve(start), Duration::ZERO);

        // After 2 simulated seconds the bucket has refilled (capped at 1).
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(bucket.reserve(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_hosts_do_not_contend() {
        let limiters = HostLimiters::with_budget(60.0, 1.0);
        // Each host has its own burst token; neither wait should block.
        limiters.wait_for_slot("a.example.org", None).await;
        limiters.wait_for_slot("b.example.org", None).await;
    }
}

//! Token-bucket implementation
//!
//! One bucket per key, refilled by elapsed time. The lock is released
//! before any sleep so CPU-bound callers never block behind a waiter.

use crate::limiter::{RateLimitError, ThrottleConfig};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    paused_until: Option<Instant>,
}

impl Bucket {
    fn full(config: &ThrottleConfig, now: Instant) -> Self {
        Self {
            tokens: config.burst as f64,
            last_refill: now,
            paused_until: None,
        }
    }

    /// Refill by elapsed time. While a penalty pause is active no tokens
    /// accrue; once it elapses, refill restarts from the pause end.
    fn refill(&mut self, config: &ThrottleConfig, now: Instant) {
        if let Some(until) = self.paused_until {
            if now < until {
                return;
            }
            self.paused_until = None;
            self.last_refill = until;
        }
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.rate_per_sec).min(config.burst as f64);
        self.last_refill = now;
    }

    /// How long until one token is available, or zero if one was taken.
    fn take_or_wait(&mut self, config: &ThrottleConfig, now: Instant) -> Option<Duration> {
        if let Some(until) = self.paused_until {
            return Some(until.saturating_duration_since(now));
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return None;
        }
        let deficit = 1.0 - self.tokens;
        Some(Duration::from_secs_f64(deficit / config.rate_per_sec))
    }
}

/// Keyed token-bucket throttle
#[derive(Debug)]
pub struct TokenBucketThrottle {
    config: ThrottleConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire one token for `key`, suspending until one is available.
    ///
    /// Returns `RateLimitError::Cancelled` when the caller's cancellation
    /// token fires first.
    pub async fn acquire(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let now = Instant::now();
                let bucket = buckets
                    .entry(key.to_string())
                    .or_insert_with(|| Bucket::full(&self.config, now));
                bucket.refill(&self.config, now);
                match bucket.take_or_wait(&self.config, now) {
                    None => return Ok(()),
                    Some(wait) => wait,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = tokio::time::sleep(wait) => {},
            }
        }
    }

    /// 429 hook: drain the bucket for `key` and pause refill for
    /// `retry_after`.
    pub async fn penalize(&self, key: &str, retry_after: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(&self.config, now));
        bucket.tokens = 0.0;
        bucket.paused_until = Some(now + retry_after);
        tracing::warn!(key = %key, retry_after_ms = %retry_after.as_millis(), "Throttle penalized by upstream 429");
    }

    /// Remaining tokens for a key without taking one. Missing keys report a
    /// full bucket.
    pub async fn available(&self, key: &str) -> f64 {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.refill(&self.config, now);
                bucket.tokens
            },
            None => self.config.burst as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::throttle_key;

    fn throttle(rate: f64, burst: u32) -> TokenBucketThrottle {
        TokenBucketThrottle::new(ThrottleConfig::new(rate, burst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_grants_immediately() {
        let throttle = throttle(1.0, 2);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        throttle.acquire("spapi:t1", &cancel).await.unwrap();
        throttle.acquire("spapi:t1", &cancel).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_paces_requests() {
        let throttle = throttle(1.0, 1);
        let cancel = CancellationToken::new();

        throttle.acquire("spapi:t1", &cancel).await.unwrap();

        let start = Instant::now();
        throttle.acquire("spapi:t1", &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bound_over_window() {
        // rate + burst bounds grants in any one-second window
        let throttle = throttle(1.0, 1);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let mut granted_in_first_second = 0u32;
        for _ in 0..4 {
            throttle.acquire("spapi:t1", &cancel).await.unwrap();
            if start.elapsed() < Duration::from_secs(1) {
                granted_in_first_second += 1;
            }
        }

        assert!(granted_in_first_second <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_penalize_pauses_refill() {
        let throttle = throttle(1.0, 1);
        let cancel = CancellationToken::new();

        throttle.acquire("spapi:t1", &cancel).await.unwrap();
        throttle
            .penalize("spapi:t1", Duration::from_secs(2))
            .await;

        let start = Instant::now();
        throttle.acquire("spapi:t1", &cancel).await.unwrap();

        // 2s pause, then one token accrues
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let throttle = throttle(1.0, 1);
        let cancel = CancellationToken::new();

        throttle
            .acquire(&throttle_key("spapi", "t1"), &cancel)
            .await
            .unwrap();

        let start = Instant::now();
        throttle
            .acquire(&throttle_key("spapi", "t2"), &cancel)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_wait() {
        let throttle = std::sync::Arc::new(throttle(1.0, 1));
        let cancel = CancellationToken::new();

        throttle.acquire("spapi:t1", &cancel).await.unwrap();

        let waiter = {
            let throttle = throttle.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { throttle.acquire("spapi:t1", &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(RateLimitError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_reports_refilled_tokens() {
        let throttle = throttle(2.0, 2);
        let cancel = CancellationToken::new();

        throttle.acquire("spapi:t1", &cancel).await.unwrap();
        throttle.acquire("spapi:t1", &cancel).await.unwrap();
        assert!(throttle.available("spapi:t1").await < 1.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(throttle.available("spapi:t1").await >= 1.9);
    }
}

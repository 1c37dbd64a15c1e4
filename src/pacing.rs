// src/pacing.rs
//! Retry and rate-pacing primitives, independent of any particular caller.
//!
//! - [`RetryPolicy`]: bounded attempts with fixed or exponential delay.
//! - [`TokenBucket`]: async permit source. Capacity 1 with a refill interval
//!   gives strict sequential spacing; larger capacities allow bursts once
//!   callers run concurrently.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Bounded retry schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 1.0 keeps the delay fixed.
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// - Attempt 1: base
    /// - Attempt n: base * multiplier^(n-1), capped by `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }

    pub fn can_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 5 s apart.
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled at one token per `refill_every`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_every: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Starts full.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1) as f64;
        Self {
            capacity,
            refill_every,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Sequential pacing: one call, then one per `spacing`.
    pub fn spaced(spacing: Duration) -> Self {
        Self::new(1, spacing)
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut st = self.state.lock().await;
                self.refill(&mut st);
                if st.tokens >= 1.0 {
                    st.tokens -= 1.0;
                    return;
                }
                let missing = 1.0 - st.tokens;
                self.refill_every.mul_f64(missing)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token without waiting, if one is available.
    pub async fn try_acquire(&self) -> bool {
        let mut st = self.state.lock().await;
        self.refill(&mut st);
        if st.tokens >= 1.0 {
            st.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, st: &mut BucketState) {
        if self.refill_every.is_zero() {
            st.tokens = self.capacity;
            return;
        }
        let now = Instant::now();
        let gained = now.duration_since(st.last_refill).as_secs_f64() / self.refill_every.as_secs_f64();
        if gained > 0.0 {
            st.tokens = (st.tokens + gained).min(self.capacity);
            st.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_keeps_constant_delay() {
        let p = RetryPolicy::fixed(3, Duration::from_secs(5));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(5));
        assert!(p.can_retry(2));
        assert!(!p.can_retry(3));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy::fixed(5, Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(5));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(4), Duration::from_secs(5));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn zero_interval_never_blocks() {
        let bucket = TokenBucket::spaced(Duration::ZERO);
        for _ in 0..100 {
            assert!(bucket.try_acquire().await);
        }
    }

    #[tokio::test]
    async fn spaced_bucket_enforces_interval() {
        let bucket = TokenBucket::spaced(Duration::from_millis(30));
        let start = Instant::now();
        bucket.acquire().await; // immediate, bucket starts full
        assert!(!bucket.try_acquire().await);
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}

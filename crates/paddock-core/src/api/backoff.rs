//! Retry timing for rate-limited requests.
//!
//! `RetryPolicy` is immutable tuning loaded from config. `RateLimitState`
//! is the mutable part: it is created at the start of each fetch cycle and
//! threaded through every request of that cycle.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// Backoff for the first retry; doubles per attempt
    pub base_retry_delay_ms: u64,
    /// Backoff ceiling before jitter
    pub max_retry_delay_ms: u64,
    /// Upper bound of the random jitter added to computed backoff
    pub jitter_ms: u64,
    /// Added to a server-supplied `retry-after`
    pub retry_after_padding_ms: u64,
    /// Ceiling for a server-supplied wait, padding included
    pub max_retry_after_ms: u64,
    /// Starting spacing between uncached session requests
    pub base_request_delay_ms: u64,
    /// Ceiling for the spacing while rate limiting persists
    pub max_request_delay_ms: u64,
    /// Spacing multiplier applied on each 429
    pub request_delay_growth: f64,
    /// Pause after a session served from cache
    pub cached_session_pause_ms: u64,
    /// Pause around each manual cache prime
    pub prime_pause_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_retry_delay_ms: 3_000,
            max_retry_delay_ms: 30_000,
            jitter_ms: 500,
            retry_after_padding_ms: 500,
            max_retry_after_ms: 300_000,
            base_request_delay_ms: 2_000,
            max_request_delay_ms: 10_000,
            request_delay_growth: 1.5,
            cached_session_pause_ms: 100,
            prime_pause_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^(attempt-1), max)`, without jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .base_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(ms)
    }

    /// Delay requested by a `retry-after` header (seconds), plus padding.
    /// Returns `None` for anything that is not a non-negative number.
    /// Capped at `max_retry_after_ms`.
    pub fn retry_after_delay(&self, header: &str) -> Option<Duration> {
        let seconds: f64 = header.trim().parse().ok()?;
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        let ms = (seconds * 1000.0) as u64;
        let ms = ms
            .saturating_add(self.retry_after_padding_ms)
            .min(self.max_retry_after_ms);
        Some(Duration::from_millis(ms))
    }

    /// Delay before the retry following `attempt`
    pub fn retry_delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(|h| self.retry_after_delay(h))
            .unwrap_or_else(|| self.backoff_delay(attempt) + self.jitter())
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.jitter_ms))
    }

    pub fn base_request_delay(&self) -> Duration {
        Duration::from_millis(self.base_request_delay_ms)
    }

    pub fn cached_session_pause(&self) -> Duration {
        Duration::from_millis(self.cached_session_pause_ms)
    }

    pub fn prime_pause(&self) -> Duration {
        Duration::from_millis(self.prime_pause_ms)
    }
}

/// Rate-limit bookkeeping carried across the requests of one fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitState {
    request_delay: Duration,
    consecutive_429: u32,
    total_429: u32,
}

impl RateLimitState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            request_delay: policy.base_request_delay(),
            consecutive_429: 0,
            total_429: 0,
        }
    }

    /// Current spacing between uncached requests
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn consecutive_429(&self) -> u32 {
        self.consecutive_429
    }

    /// Every 429 seen since this state was created
    pub fn total_429(&self) -> u32 {
        self.total_429
    }

    pub fn record_rate_limited(&mut self) {
        self.consecutive_429 += 1;
        self.total_429 += 1;
    }

    /// Widen the request spacing by the growth factor, up to the ceiling
    pub fn grow_request_delay(&mut self, policy: &RetryPolicy) {
        let current = self.request_delay.as_millis() as f64;
        let grown = (current * policy.request_delay_growth).min(policy.max_request_delay_ms as f64);
        self.request_delay = Duration::from_millis(grown.max(0.0) as u64);
    }

    pub fn record_success(&mut self, policy: &RetryPolicy) {
        self.consecutive_429 = 0;
        self.request_delay = policy.base_request_delay();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|a| policy.backoff_delay(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 6_000, 12_000, 24_000, 30_000, 30_000]);
    }

    #[test]
    fn test_backoff_never_overflows() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(30_000));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(3_000));
    }

    #[test]
    fn test_retry_delay_is_non_decreasing_without_header() {
        let policy = RetryPolicy::default();
        for attempt in 1..policy.max_retries {
            let low = policy.backoff_delay(attempt);
            let delay = policy.retry_delay(attempt, None);
            assert!(delay >= low);
            assert!(delay < low + Duration::from_millis(policy.jitter_ms));
            assert!(policy.backoff_delay(attempt + 1) >= low);
        }
    }

    #[test]
    fn test_retry_after_header_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_delay(1, Some("2")), Duration::from_millis(2_500));
        assert_eq!(policy.retry_delay(4, Some("0.5")), Duration::from_millis(1_000));
    }

    #[test]
    fn test_huge_retry_after_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_delay(1, Some("1e300")), Duration::from_millis(300_000));
        assert_eq!(policy.retry_delay(1, Some("120")), Duration::from_millis(120_500));
    }

    #[test]
    fn test_invalid_retry_after_falls_back_to_backoff() {
        let policy = RetryPolicy {
            jitter_ms: 0,
            ..Default::default()
        };
        assert_eq!(policy.retry_delay(2, Some("soon")), Duration::from_millis(6_000));
        assert_eq!(policy.retry_delay(2, Some("-1")), Duration::from_millis(6_000));
    }

    #[test]
    fn test_request_delay_grows_and_resets() {
        let policy = RetryPolicy::default();
        let mut state = RateLimitState::new(&policy);
        assert_eq!(state.request_delay(), Duration::from_millis(2_000));

        state.record_rate_limited();
        state.grow_request_delay(&policy);
        assert_eq!(state.request_delay(), Duration::from_millis(3_000));

        for _ in 0..10 {
            state.record_rate_limited();
            state.grow_request_delay(&policy);
        }
        assert_eq!(state.request_delay(), Duration::from_millis(10_000));
        assert_eq!(state.consecutive_429(), 11);

        state.record_success(&policy);
        assert_eq!(state.request_delay(), Duration::from_millis(2_000));
        assert_eq!(state.consecutive_429(), 0);
        assert_eq!(state.total_429(), 11);
    }

    #[test]
    fn test_policy_deserializes_partial_config() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 2}"#).unwrap();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_retry_delay_ms, 3_000);
    }
}

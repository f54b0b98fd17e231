//! API client for the OpenF1 REST API.
//!
//! The client is stateless between calls: rate-limit bookkeeping is passed
//! in by the caller as a `RateLimitState`, so a fetch cycle owns its own
//! backoff state and tests can observe it directly.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::models::{Driver, RaceSession, SessionResult};

use super::{ApiError, HttpResponse, HttpTransport, RateLimitState, ReqwestTransport, RetryPolicy};

// ============================================================================
// Endpoints
// ============================================================================

/// Default OpenF1 API root
pub const DEFAULT_API_BASE_URL: &str = "https://api.openf1.org/v1";

/// Fully resolved endpoint URLs for one season
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Session list, already filtered by year and session name
    pub sessions: String,
    /// Session results, unfiltered; per-session requests append `session_key`
    pub session_results: String,
    pub drivers: String,
}

impl Endpoints {
    pub fn openf1(
        base_url: &str,
        season: u16,
        session_name: &str,
        drivers_session_key: Option<i64>,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let drivers_key = drivers_session_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| "latest".to_string());
        Self {
            sessions: format!("{}/sessions?year={}&session_name={}", base, season, session_name),
            session_results: format!("{}/session_result", base),
            drivers: format!("{}/drivers?session_key={}", base, drivers_key),
        }
    }

    pub fn session_results_for(&self, session_key: i64) -> String {
        format!("{}?session_key={}", self.session_results, session_key)
    }
}

// ============================================================================
// Client
// ============================================================================

/// Result of a request that may give up under sustained rate limiting
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Fetched(T),
    /// Every attempt was answered with 429
    Exhausted {
        attempts: u32,
        /// The delay that would have preceded the next attempt
        retry_delay: Duration,
    },
}

impl<T> FetchOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Fetched(value) => FetchOutcome::Fetched(f(value)),
            FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            } => FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            },
        }
    }

    /// Convert exhaustion into `ApiError::RateLimited`
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            FetchOutcome::Fetched(value) => Ok(value),
            FetchOutcome::Exhausted { retry_delay, .. } => Err(ApiError::RateLimited { retry_delay }),
        }
    }
}

/// How a response body that is valid JSON but not an array is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayMode {
    /// Non-array is `UnexpectedFormat`
    Strict,
    /// Non-array is an empty list
    Lenient,
}

pub struct ApiClient<T = ReqwestTransport> {
    transport: T,
    endpoints: Endpoints,
    policy: RetryPolicy,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client backed by `reqwest` with a per-request timeout
    pub fn new(endpoints: Endpoints, policy: RetryPolicy, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self::with_transport(ReqwestTransport::new(timeout)?, endpoints, policy))
    }
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn with_transport(transport: T, endpoints: Endpoints, policy: RetryPolicy) -> Self {
        Self {
            transport,
            endpoints,
            policy,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET with bounded retry on 429. Non-429 failure statuses are errors;
    /// a success resets the rate-limit state.
    async fn get_with_retry(
        &self,
        url: &str,
        state: &mut RateLimitState,
    ) -> Result<FetchOutcome<HttpResponse>, ApiError> {
        let mut attempt = 1;

        loop {
            debug!(url, attempt, "Sending GET request");
            let response = self.transport.get(url).await?;

            if !response.is_rate_limited() {
                if !response.is_success() {
                    return Err(ApiError::from_status(response.status, &response.body));
                }
                state.record_success(&self.policy);
                return Ok(FetchOutcome::Fetched(response));
            }

            state.record_rate_limited();
            let retry_delay = self
                .policy
                .retry_delay(attempt, response.retry_after.as_deref());

            if attempt >= self.policy.max_retries {
                error!(url, attempts = attempt, "Max retries reached, giving up");
                return Ok(FetchOutcome::Exhausted {
                    attempts: attempt,
                    retry_delay,
                });
            }

            state.grow_request_delay(&self.policy);
            warn!(
                url,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = retry_delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(retry_delay).await;
            attempt += 1;
        }
    }

    fn parse_array<D: DeserializeOwned>(url: &str, body: &str, mode: ArrayMode) -> Result<Vec<D>, ApiError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ApiError::UnexpectedFormat(format!("invalid JSON from {}: {}", url, e)))?;

        match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)
                .map_err(|e| ApiError::UnexpectedFormat(format!("unexpected item shape from {}: {}", url, e))),
            _ if mode == ArrayMode::Lenient => {
                debug!(url, "Non-array response treated as empty");
                Ok(Vec::new())
            }
            _ => Err(ApiError::UnexpectedFormat(format!("expected a JSON array from {}", url))),
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch the season's race sessions (without results attached)
    pub async fn fetch_sessions(&self, state: &mut RateLimitState) -> Result<Vec<RaceSession>, ApiError> {
        let url = &self.endpoints.sessions;
        let response = self.get_with_retry(url, state).await?.into_result()?;
        Self::parse_array(url, &response.body, ArrayMode::Strict)
    }

    /// Fetch driver metadata
    pub async fn fetch_drivers(&self, state: &mut RateLimitState) -> Result<Vec<Driver>, ApiError> {
        let url = &self.endpoints.drivers;
        let response = self.get_with_retry(url, state).await?.into_result()?;
        Self::parse_array(url, &response.body, ArrayMode::Strict)
    }

    /// Fetch one session's results. A non-array body is an empty list.
    pub async fn fetch_session_results(
        &self,
        session_key: i64,
        state: &mut RateLimitState,
    ) -> Result<FetchOutcome<Vec<SessionResult>>, ApiError> {
        let url = self.endpoints.session_results_for(session_key);
        match self.get_with_retry(&url, state).await? {
            FetchOutcome::Fetched(response) => Ok(FetchOutcome::Fetched(Self::parse_array(
                &url,
                &response.body,
                ArrayMode::Lenient,
            )?)),
            FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            } => Ok(FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            }),
        }
    }

    /// Fetch every session result in one unfiltered request
    pub async fn fetch_all_session_results(
        &self,
        state: &mut RateLimitState,
    ) -> Result<FetchOutcome<Vec<SessionResult>>, ApiError> {
        let url = &self.endpoints.session_results;
        match self.get_with_retry(url, state).await? {
            FetchOutcome::Fetched(response) => Ok(FetchOutcome::Fetched(Self::parse_array(
                url,
                &response.body,
                ArrayMode::Lenient,
            )?)),
            FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            } => Ok(FetchOutcome::Exhausted {
                attempts,
                retry_delay,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::{network_failure, ok, rate_limited, status, ScriptedTransport};

    const BASE: &str = "https://api.test/v1";

    fn endpoints() -> Endpoints {
        Endpoints::openf1(BASE, 2025, "Race", Some(9869))
    }

    fn client(transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::with_transport(transport, endpoints(), RetryPolicy::default())
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = Endpoints::openf1("https://api.openf1.org/v1/", 2025, "Race", None);
        assert_eq!(
            endpoints.sessions,
            "https://api.openf1.org/v1/sessions?year=2025&session_name=Race"
        );
        assert_eq!(
            endpoints.session_results_for(9693),
            "https://api.openf1.org/v1/session_result?session_key=9693"
        );
        assert_eq!(endpoints.drivers, "https://api.openf1.org/v1/drivers?session_key=latest");
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_results_success_resets_state() {
        let url = endpoints().session_results_for(1);
        let client = client(ScriptedTransport::new().on(
            url.clone(),
            vec![
                rate_limited(None),
                ok(r#"[{"session_key": 1, "driver_number": 4, "position": 1, "points": 25}]"#),
            ],
        ));
        let mut state = RateLimitState::new(client.policy());

        let outcome = client.fetch_session_results(1, &mut state).await.unwrap();

        match outcome {
            FetchOutcome::Fetched(results) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].points, Some(25.0));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(client.transport().request_count(&url), 2);
        assert_eq!(state.consecutive_429(), 0);
        assert_eq!(state.total_429(), 1);
        assert_eq!(state.request_delay(), client.policy().base_request_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_max_retries() {
        let url = endpoints().session_results_for(2);
        let client = client(ScriptedTransport::new().on(url.clone(), vec![rate_limited(None)]));
        let mut state = RateLimitState::new(client.policy());

        let outcome = client.fetch_session_results(2, &mut state).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 5, .. }));
        assert_eq!(client.transport().request_count(&url), 5);
        assert_eq!(state.consecutive_429(), 5);
        // Grown on each of the four retries: 2000 -> 3000 -> 4500 -> 6750 -> 10000
        assert_eq!(state.request_delay(), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header_controls_wait() {
        let url = endpoints().session_results_for(3);
        let client = client(ScriptedTransport::new().on(
            url,
            vec![rate_limited(Some("1")), rate_limited(Some("1")), ok("[]")],
        ));
        let mut state = RateLimitState::new(client.policy());

        let started = tokio::time::Instant::now();
        client.fetch_session_results(3, &mut state).await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(3_000));
        assert!(elapsed < Duration::from_millis(3_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_waits_accumulate() {
        let url = endpoints().session_results_for(4);
        let client = client(ScriptedTransport::new().on(url, vec![rate_limited(None)]));
        let mut state = RateLimitState::new(client.policy());

        let started = tokio::time::Instant::now();
        client.fetch_session_results(4, &mut state).await.unwrap();
        let elapsed = started.elapsed();

        // 3s + 6s + 12s + 24s of backoff, plus up to 500ms jitter each
        assert!(elapsed >= Duration::from_millis(45_000));
        assert!(elapsed < Duration::from_millis(47_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_is_request_failed() {
        let url = endpoints().session_results_for(5);
        let client = client(ScriptedTransport::new().on(url.clone(), vec![status(500)]));
        let mut state = RateLimitState::new(client.policy());

        let err = client.fetch_session_results(5, &mut state).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        // Hard failures are not retried
        assert_eq!(client.transport().request_count(&url), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_array_results_are_empty() {
        let url = endpoints().session_results_for(6);
        let client = client(ScriptedTransport::new().on(url, vec![ok(r#"{"detail": "No results found."}"#)]));
        let mut state = RateLimitState::new(client.policy());

        let outcome = client.fetch_session_results(6, &mut state).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Fetched(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_require_an_array() {
        let client = client(ScriptedTransport::new().on(endpoints().sessions, vec![ok(r#"{"error": "nope"}"#)]));
        let mut state = RateLimitState::new(client.policy());

        let err = client.fetch_sessions(&mut state).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedFormat(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_rate_limit_exhaustion_is_an_error() {
        let client = client(ScriptedTransport::new().on(endpoints().sessions, vec![rate_limited(None)]));
        let mut state = RateLimitState::new(client.policy());

        let err = client.fetch_sessions(&mut state).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_is_an_error() {
        let client = client(ScriptedTransport::new().on(endpoints().drivers, vec![network_failure()]));
        let mut state = RateLimitState::new(client.policy());

        let err = client.fetch_drivers(&mut state).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_drivers() {
        let client = client(ScriptedTransport::new().on(
            endpoints().drivers,
            vec![ok(r#"[{"driver_number": 81, "last_name": "Piastri", "team_colour": "FF8000"}]"#)],
        ));
        let mut state = RateLimitState::new(client.policy());

        let drivers = client.fetch_drivers(&mut state).await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].display_last_name(), Some("Piastri"));
    }

    #[test]
    fn test_outcome_into_result() {
        let exhausted: FetchOutcome<Vec<i32>> = FetchOutcome::Exhausted {
            attempts: 5,
            retry_delay: Duration::from_secs(3),
        };
        match exhausted.into_result() {
            Err(ApiError::RateLimited { retry_delay }) => assert_eq!(retry_delay, Duration::from_secs(3)),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(FetchOutcome::Fetched(2).map(|n| n * 2).into_result().unwrap(), 4);
    }
}

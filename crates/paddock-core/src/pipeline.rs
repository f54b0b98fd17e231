//! Session aggregation pipeline.
//!
//! `SessionPipeline` runs one fetch cycle: it returns the cached season
//! aggregate if there is one, otherwise it fetches the session list and
//! resolves each session's results strictly one after another, from the
//! cache where possible and from the network otherwise, spacing uncached
//! requests by the current inter-request delay.
//!
//! Failure policy:
//! - session list failures abort the cycle and are returned to the caller
//! - a single session's failure (hard error, network error, or exhausted
//!   retries) degrades to an empty result list for that session only
//! - cache failures are logged by `CacheManager` and behave as misses

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::api::{ApiClient, ApiError, FetchOutcome, HttpTransport, RateLimitState, ReqwestTransport};
use crate::cache::{CacheKeys, CacheManager, FileStore, KeyValueStore};
use crate::models::{Driver, RaceSession, SessionResult};

/// How session results are resolved when the aggregate is not cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// One request per uncached session, paced by the inter-request delay
    #[default]
    PerSession,
    /// One unfiltered request for every result, grouped by session key
    Bulk,
}

/// Where an aggregate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    Cached,
    Fresh,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Cached => write!(f, "Cached"),
            DataSource::Fresh => write!(f, "Fresh"),
        }
    }
}

/// Per-cycle counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Sessions whose results came from the cache
    pub from_cache: usize,
    /// Sessions whose results were fetched and non-empty
    pub fetched: usize,
    /// Sessions left with an empty result list
    pub empty: usize,
    /// 429 responses seen during the cycle
    pub rate_limited: u32,
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub sessions: Vec<RaceSession>,
    pub source: DataSource,
    pub report: FetchReport,
}

pub struct SessionPipeline<T = ReqwestTransport, S = FileStore> {
    client: ApiClient<T>,
    cache: CacheManager<S>,
    keys: CacheKeys,
    ttl: Duration,
    strategy: AggregationStrategy,
}

impl<T: HttpTransport, S: KeyValueStore> SessionPipeline<T, S> {
    pub fn new(client: ApiClient<T>, cache: CacheManager<S>, keys: CacheKeys, ttl: Duration) -> Self {
        Self {
            client,
            cache,
            keys,
            ttl,
            strategy: AggregationStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn cache(&self) -> &CacheManager<S> {
        &self.cache
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Results for one session: cache first, then the network. Never fails;
    /// any error is logged and yields an empty list. Non-empty network
    /// results are cached, empty ones never are.
    pub async fn fetch_session_results(
        &self,
        session_key: i64,
        state: &mut RateLimitState,
    ) -> Vec<SessionResult> {
        let key = self.keys.session_result(session_key);
        if let Some(cached) = self.cache.get::<Vec<SessionResult>>(&key) {
            debug!(session_key, "Using cached session results");
            return cached;
        }

        match self.client.fetch_session_results(session_key, state).await {
            Ok(FetchOutcome::Fetched(results)) => {
                if !results.is_empty() {
                    self.cache.set(&key, &results, self.ttl);
                }
                results
            }
            Ok(FetchOutcome::Exhausted { attempts, .. }) => {
                error!(session_key, attempts, "Max retries reached, returning empty result");
                Vec::new()
            }
            Err(e @ (ApiError::NetworkError(_) | ApiError::Transport(_))) => {
                error!(session_key, error = %e, "Network error fetching session results");
                Vec::new()
            }
            Err(e) => {
                error!(session_key, error = %e, "Failed to fetch session results");
                Vec::new()
            }
        }
    }

    /// Run one fetch cycle and return every race session with its results
    pub async fn fetch_race_sessions_with_results(&self) -> Result<Aggregate, ApiError> {
        if let Some(sessions) = self.cache.get::<Vec<RaceSession>>(self.keys.sessions()) {
            info!(count = sessions.len(), "Using cached race sessions");
            let report = FetchReport {
                from_cache: sessions.len(),
                ..Default::default()
            };
            return Ok(Aggregate {
                sessions,
                source: DataSource::Cached,
                report,
            });
        }

        // Fresh backoff state for every cycle
        let mut state = RateLimitState::new(self.client.policy());

        info!(strategy = ?self.strategy, "Fetching race sessions");
        let sessions = self.client.fetch_sessions(&mut state).await?;

        let (sessions, mut report) = match self.strategy {
            AggregationStrategy::PerSession => self.attach_per_session(sessions, &mut state).await,
            AggregationStrategy::Bulk => self.attach_bulk(sessions, &mut state).await,
        };
        report.rate_limited = state.total_429();

        self.cache.set(self.keys.sessions(), &sessions, self.ttl);
        info!(
            sessions = sessions.len(),
            from_cache = report.from_cache,
            fetched = report.fetched,
            empty = report.empty,
            rate_limited = report.rate_limited,
            "Fetch cycle complete"
        );

        Ok(Aggregate {
            sessions,
            source: DataSource::Fresh,
            report,
        })
    }

    /// Drop expired entries under the reserved prefixes, then run a fetch
    /// cycle. This is the entry point for a normal load.
    pub async fn load_race_sessions(&self) -> Result<Aggregate, ApiError> {
        self.clear_expired();
        self.fetch_race_sessions_with_results().await
    }

    async fn attach_per_session(
        &self,
        sessions: Vec<RaceSession>,
        state: &mut RateLimitState,
    ) -> (Vec<RaceSession>, FetchReport) {
        let total = sessions.len();
        let mut report = FetchReport::default();
        let mut attached = Vec::with_capacity(total);

        for (i, mut session) in sessions.into_iter().enumerate() {
            let key = self.keys.session_result(session.session_key);

            if let Some(cached) = self.cache.get::<Vec<SessionResult>>(&key) {
                debug!(session_key = session.session_key, "[{}/{}] Session from cache", i + 1, total);
                session.results = cached;
                report.from_cache += 1;
                if i + 1 < total {
                    tokio::time::sleep(self.client.policy().cached_session_pause()).await;
                }
            } else {
                if i > 0 {
                    tokio::time::sleep(state.request_delay()).await;
                }
                info!(
                    session_key = session.session_key,
                    delay_ms = state.request_delay().as_millis() as u64,
                    "[{}/{}] Fetching session results",
                    i + 1,
                    total
                );
                session.results = self.fetch_session_results(session.session_key, state).await;
                if session.results.is_empty() {
                    report.empty += 1;
                } else {
                    report.fetched += 1;
                }
            }

            attached.push(session);
        }

        (attached, report)
    }

    async fn attach_bulk(
        &self,
        sessions: Vec<RaceSession>,
        state: &mut RateLimitState,
    ) -> (Vec<RaceSession>, FetchReport) {
        let wanted: HashSet<i64> = sessions.iter().map(|s| s.session_key).collect();

        let all_results = match self.client.fetch_all_session_results(state).await {
            Ok(FetchOutcome::Fetched(results)) => results,
            Ok(FetchOutcome::Exhausted { attempts, .. }) => {
                error!(attempts, "Max retries reached for bulk session results");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch bulk session results");
                Vec::new()
            }
        };

        let mut grouped: HashMap<i64, Vec<SessionResult>> = HashMap::new();
        for result in all_results {
            if let Some(key) = result.session_key.filter(|k| wanted.contains(k)) {
                grouped.entry(key).or_default().push(result);
            }
        }

        let mut report = FetchReport::default();
        let attached = sessions
            .into_iter()
            .map(|mut session| {
                session.results = grouped.remove(&session.session_key).unwrap_or_default();
                if session.results.is_empty() {
                    report.empty += 1;
                } else {
                    let key = self.keys.session_result(session.session_key);
                    self.cache.set(&key, &session.results, self.ttl);
                    report.fetched += 1;
                }
                session
            })
            .collect();

        (attached, report)
    }

    /// Fetch driver metadata with its own rate-limit state
    pub async fn fetch_drivers(&self) -> Result<Vec<Driver>, ApiError> {
        let mut state = RateLimitState::new(self.client.policy());
        self.client.fetch_drivers(&mut state).await
    }
}

// ============================================================================
// Tests
// ============================================================================

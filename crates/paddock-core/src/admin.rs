//! Cache administration operations.
//!
//! These run against the same `SessionPipeline` as a normal fetch cycle, so
//! primed entries are exactly what the next cycle will read back.

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::api::{ApiError, HttpTransport, RateLimitState};
use crate::cache::KeyValueStore;
use crate::pipeline::{Aggregate, SessionPipeline};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Remove every cache entry, then run a fresh fetch cycle
    ClearAllCache,
    /// Remove only entries whose TTL has elapsed
    ClearExpired,
    /// Fetch and cache one session's results unless already cached
    PrimeCache(i64),
    /// Prime several sessions, one after another
    PrimeCacheMultiple(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeOutcome {
    AlreadyCached,
    Primed { results: usize },
    /// Nothing to cache: the fetch failed or returned no results
    Empty,
}

#[derive(Debug)]
pub enum AdminOutcome {
    Cleared {
        removed: usize,
        refetch: Result<Aggregate, ApiError>,
    },
    ClearedExpired {
        removed: usize,
    },
    Primed(i64, PrimeOutcome),
    PrimedMultiple(Vec<(i64, PrimeOutcome)>),
}

impl<T: HttpTransport, S: KeyValueStore> SessionPipeline<T, S> {
    pub async fn execute(&self, command: AdminCommand) -> AdminOutcome {
        match command {
            AdminCommand::ClearAllCache => {
                let (removed, refetch) = self.clear_all_cache().await;
                AdminOutcome::Cleared { removed, refetch }
            }
            AdminCommand::ClearExpired => AdminOutcome::ClearedExpired {
                removed: self.clear_expired(),
            },
            AdminCommand::PrimeCache(session_key) => {
                AdminOutcome::Primed(session_key, self.prime_cache(session_key).await)
            }
            AdminCommand::PrimeCacheMultiple(keys) => {
                AdminOutcome::PrimedMultiple(self.prime_cache_multiple(&keys).await)
            }
        }
    }

    /// Remove every entry under this season's prefixes and refetch
    pub async fn clear_all_cache(&self) -> (usize, Result<Aggregate, ApiError>) {
        let removed = self.cache().clear_all(&self.keys().prefixes());
        info!(removed, "Cleared all cache entries, refetching");
        (removed, self.fetch_race_sessions_with_results().await)
    }

    pub fn clear_expired(&self) -> usize {
        let removed = self.cache().clear_expired(&self.keys().prefixes());
        info!(removed, "Cleared expired cache entries");
        removed
    }

    /// Cache one session's results. A cached session makes no request; an
    /// uncached one waits the prime pause before fetching.
    pub async fn prime_cache(&self, session_key: i64) -> PrimeOutcome {
        if self.cache().contains(&self.keys().session_result(session_key)) {
            info!(session_key, "Session already cached");
            return PrimeOutcome::AlreadyCached;
        }

        tokio::time::sleep(self.client().policy().prime_pause()).await;

        let mut state = RateLimitState::new(self.client().policy());
        let results = self.fetch_session_results(session_key, &mut state).await;
        if results.is_empty() {
            info!(session_key, "No results to prime");
            PrimeOutcome::Empty
        } else {
            info!(session_key, results = results.len(), "Primed session results");
            PrimeOutcome::Primed {
                results: results.len(),
            }
        }
    }

    /// Prime each key in order, pausing after every key
    pub async fn prime_cache_multiple(&self, session_keys: &[i64]) -> Vec<(i64, PrimeOutcome)> {
        let pause = self.client().policy().prime_pause();
        stream::iter(session_keys.iter().copied())
            .then(|session_key| async move {
                let outcome = self.prime_cache(session_key).await;
                tokio::time::sleep(pause).await;
                (session_key, outcome)
            })
            .collect()
            .await
    }
}

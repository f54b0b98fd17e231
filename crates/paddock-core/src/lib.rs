//! Paddock core - fetch, cache and chart OpenF1 race results.
//!
//! This crate holds everything behind the `paddock` CLI: the OpenF1 API
//! client with its rate-limit backoff, the TTL cache over a key-value
//! store, the sequential session aggregation pipeline, cache
//! administration, and the championship chart transform.

pub mod admin;
pub mod api;
pub mod cache;
pub mod chart;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use admin::{AdminCommand, AdminOutcome, PrimeOutcome};
pub use api::{ApiClient, ApiError, Endpoints, RateLimitState, RetryPolicy};
pub use cache::{CacheKeys, CacheManager, FileStore, KeyValueStore, MemoryStore};
pub use chart::{transform, ChartData, ChartPoint, DriverSeries};
pub use config::Config;
pub use models::{Driver, RaceSession, SessionResult};
pub use pipeline::{Aggregate, AggregationStrategy, DataSource, FetchReport, SessionPipeline};

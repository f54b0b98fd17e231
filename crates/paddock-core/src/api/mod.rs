//! REST API client module for the OpenF1 service.
//!
//! This module provides the `ApiClient` for fetching race sessions, session
//! results and drivers. Every request goes through one bounded retry loop:
//! a 429 response is retried with exponential backoff and jitter (or the
//! server's `retry-after`) up to `RetryPolicy::max_retries`, and the shared
//! inter-request delay is widened while the upstream keeps rate limiting.
//!
//! HTTP itself sits behind the `HttpTransport` trait; `ReqwestTransport`
//! is the production implementation.

pub mod backoff;
pub mod client;
pub mod error;
pub mod transport;

pub use backoff::{RateLimitState, RetryPolicy};
pub use client::{ApiClient, Endpoints, FetchOutcome};
pub use error::ApiError;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

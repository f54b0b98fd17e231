//! Local caching module for API responses.
//!
//! This module provides the `CacheManager`, which wraps a string-keyed
//! `KeyValueStore` and stores JSON envelopes of the form
//! `{ "data": ..., "timestamp": <epoch-ms>, "ttl": <ms> }`. An entry is valid
//! while `now - timestamp <= ttl`; anything older, or anything that no longer
//! parses, is treated as absent and removed.
//!
//! Two stores are provided:
//! - `FileStore`: one JSON file per key in a cache directory, bounded by a
//!   byte capacity
//! - `MemoryStore`: a map with the same contract, for tests and `--memory` runs

pub mod error;
pub mod keys;
pub mod manager;
pub mod store;

pub use error::{CacheError, StoreError};
pub use keys::CacheKeys;
pub use manager::{CacheEntry, CacheManager};
pub use store::{FileStore, KeyValueStore, MemoryStore};

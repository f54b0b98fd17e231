use thiserror::Error;

/// Failures of the underlying key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: need {needed} bytes, capacity is {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Cache failures. These are logged by `CacheManager` and never surfaced
/// to callers of `get`/`set`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache entry {key}: {source}")]
    Read { key: String, source: StoreError },

    #[error("Malformed cache entry {key}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache entry {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("Failed to write cache entry {key}: {source}")]
    Write { key: String, source: StoreError },
}

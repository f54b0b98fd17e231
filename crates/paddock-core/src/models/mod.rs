//! Data models for OpenF1 entities.
//!
//! This module contains the structures deserialized from the upstream API
//! and persisted in the cache:
//!
//! - `RaceSession`: one race event, carrying its attached results
//! - `SessionResult`: one driver's classification within a session
//! - `Driver`: driver metadata, joined to results by `driver_number`

pub mod driver;
pub mod session;

pub use driver::Driver;
pub use session::{RaceSession, SessionResult};

use serde::{Deserialize, Deserializer};

/// Accept any JSON value for a numeric field, keeping it only when it is a
/// finite number. Strings, booleans and objects become `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|n| n.is_finite()))
}

/// Integer counterpart of [`lenient_f64`]. Fractional numbers are rejected.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()))
}

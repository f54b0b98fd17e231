use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A race session as returned by `/sessions`, with its results attached.
///
/// Fields this crate does not model (meeting key, location, gmt offset, ...)
/// are kept in `extra` so that a cached aggregate round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSession {
    pub session_key: i64,
    pub session_name: Option<String>,
    pub meeting_name: Option<String>,
    pub country_name: Option<String>,
    pub circuit_short_name: Option<String>,
    pub date_start: Option<String>,
    #[serde(default)]
    pub results: Vec<SessionResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RaceSession {
    /// Parsed start time, `None` when absent or not RFC 3339
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_start.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Label used on the chart axis: meeting name, else circuit, else "Race N"
    pub fn display_name(&self, index: usize) -> String {
        self.meeting_name
            .clone()
            .or_else(|| self.circuit_short_name.clone())
            .unwrap_or_else(|| format!("Race {}", index + 1))
    }

    /// The classified winner, if results contain a P1
    pub fn winner(&self) -> Option<&SessionResult> {
        self.results.iter().find(|r| r.position == Some(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_key: Option<i64>,
    #[serde(default, deserialize_with = "super::lenient_i64")]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "super::lenient_i64")]
    pub driver_number: Option<i64>,
    pub full_name: Option<String>,
    pub team_name: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_f64")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "super::lenient_i64")]
    pub laps: Option<i64>,
}

impl SessionResult {
    /// Points scored, with missing values counted as zero
    pub fn points_or_zero(&self) -> f64 {
        self.points.unwrap_or(0.0).max(0.0)
    }

    /// Last whitespace-delimited token of the full name
    pub fn derived_last_name(&self) -> Option<&str> {
        self.full_name.as_deref()?.split_whitespace().last()
    }
}

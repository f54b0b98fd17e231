//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which covers
//! the season and API endpoints, cache lifetime and capacity, the
//! aggregation strategy and retry tuning.
//!
//! Configuration is stored at `~/.config/paddock/config.json`. Every field
//! is optional in the file; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{client::DEFAULT_API_BASE_URL, Endpoints, RetryPolicy};
use crate::cache::{store::DEFAULT_CAPACITY_BYTES, CacheKeys};
use crate::pipeline::AggregationStrategy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "paddock";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `season`
pub const ENV_SEASON: &str = "PADDOCK_SEASON";

/// Environment variable overriding `api_base_url`
pub const ENV_API_BASE_URL: &str = "PADDOCK_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub season: u16,
    pub api_base_url: String,
    pub session_name: String,
    /// Session whose driver list is used for chart names; `None` is `latest`
    pub drivers_session_key: Option<i64>,
    pub cache_ttl_minutes: u64,
    pub cache_capacity_bytes: usize,
    pub request_timeout_secs: u64,
    pub strategy: AggregationStrategy,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            season: 2025,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_name: "Race".to_string(),
            drivers_session_key: Some(9869),
            cache_ttl_minutes: 60,
            cache_capacity_bytes: DEFAULT_CAPACITY_BYTES,
            request_timeout_secs: 30,
            strategy: AggregationStrategy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-season cache directory, e.g. `~/.cache/paddock/2025`
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(self.season.to_string()))
    }

    /// Apply `PADDOCK_SEASON` / `PADDOCK_API_BASE_URL` from the environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(season) = lookup(ENV_SEASON) {
            self.season = season
                .trim()
                .parse()
                .with_context(|| format!("{} must be a year, got {:?}", ENV_SEASON, season))?;
        }
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::openf1(
            &self.api_base_url,
            self.season,
            &self.session_name,
            self.drivers_session_key,
        )
    }

    pub fn cache_keys(&self) -> CacheKeys {
        CacheKeys::for_season(self.season)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"season": 2024, "strategy": "bulk", "retry": {"max_retries": 3}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.season, 2024);
        assert_eq!(config.strategy, AggregationStrategy::Bulk);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_request_delay_ms, 2_000);
        assert_eq!(config.cache_keys().sessions(), "f1_cache_sessions_2024");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = Config {
            drivers_session_key: None,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_SEASON, " 2023 "),
            (ENV_API_BASE_URL, "http://localhost:8080/v1"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();

        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.season, 2023);
        assert_eq!(
            config.endpoints().sessions,
            "http://localhost:8080/v1/sessions?year=2023&session_name=Race"
        );
    }

    #[test]
    fn test_bad_season_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|name| (name == ENV_SEASON).then(|| "next year".to_string()));
        assert!(result.is_err());
    }
}

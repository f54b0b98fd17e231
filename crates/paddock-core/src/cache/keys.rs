/// Prefix shared by every per-session results entry
const SESSION_RESULT_PREFIX: &str = "f1_cache_session_result_";

/// Prefix of the season aggregate entry; the season year is appended
const SESSIONS_PREFIX: &str = "f1_cache_sessions_";

/// Reserved cache key names for one season.
///
/// All cache maintenance is restricted to keys under these two prefixes so
/// that unrelated entries in the same store are never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    sessions: String,
}

impl CacheKeys {
    pub fn for_season(season: u16) -> Self {
        Self {
            sessions: format!("{}{}", SESSIONS_PREFIX, season),
        }
    }

    /// Key of the full season aggregate
    pub fn sessions(&self) -> &str {
        &self.sessions
    }

    /// Key of one session's results
    pub fn session_result(&self, session_key: i64) -> String {
        format!("{}{}", SESSION_RESULT_PREFIX, session_key)
    }

    /// The reserved prefixes, for `clear_expired` and `clear_all`
    pub fn prefixes(&self) -> [&str; 2] {
        [self.sessions.as_str(), SESSION_RESULT_PREFIX]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        let keys = CacheKeys::for_season(2025);
        assert_eq!(keys.sessions(), "f1_cache_sessions_2025");
        assert_eq!(keys.session_result(9693), "f1_cache_session_result_9693");
        assert_eq!(
            keys.prefixes(),
            ["f1_cache_sessions_2025", "f1_cache_session_result_"]
        );
    }

    #[test]
    fn test_every_key_falls_under_a_prefix() {
        let keys = CacheKeys::for_season(2024);
        let result_key = keys.session_result(1);
        for key in [keys.sessions(), result_key.as_str()] {
            assert!(keys.prefixes().iter().any(|p| key.starts_with(p)));
        }
    }
}

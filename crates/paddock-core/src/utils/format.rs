use chrono::{DateTime, Utc};

/// Format a session start time for display, e.g. `Sun, 16 Mar 2025, 04:00`.
/// Returns `None` for a missing or unparsable date.
pub fn format_session_date(date: Option<&str>) -> Option<String> {
    let dt = DateTime::parse_from_rfc3339(date?).ok()?;
    Some(dt.with_timezone(&Utc).format("%a, %-d %b %Y, %H:%M").to_string())
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_session_date() {
        assert_eq!(
            format_session_date(Some("2025-03-16T04:00:00+00:00")).as_deref(),
            Some("Sun, 16 Mar 2025, 04:00")
        );
        // Offsets are normalised to UTC
        assert_eq!(
            format_session_date(Some("2025-06-01T15:00:00+02:00")).as_deref(),
            Some("Sun, 1 Jun 2025, 13:00")
        );
        assert_eq!(format_session_date(Some("garbage")), None);
        assert_eq!(format_session_date(None), None);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Monaco", 10), "Monaco");
        assert_eq!(truncate_string("Emilia Romagna Grand Prix", 12), "Emilia Ro...");
        assert_eq!(truncate_string("São Paulo", 3), "São");
    }
}

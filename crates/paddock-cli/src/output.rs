//! Plain-text rendering for command output.

use std::fmt::Write;

use paddock_core::utils::{format_session_date, truncate_string};
use paddock_core::{AdminOutcome, Aggregate, ChartData, PrimeOutcome};

const MEETING_WIDTH: usize = 28;
const COUNTRY_WIDTH: usize = 16;
const NAME_WIDTH: usize = 20;

pub fn render_sessions(aggregate: &Aggregate) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<24}  {:<w1$}  {:<w2$}  {:>7}  {}",
        "#",
        "Date",
        "Meeting",
        "Country",
        "Results",
        "Winner",
        w1 = MEETING_WIDTH,
        w2 = COUNTRY_WIDTH,
    );

    for (i, session) in aggregate.sessions.iter().enumerate() {
        let date = format_session_date(session.date_start.as_deref()).unwrap_or_else(|| "-".to_string());
        let country = session.country_name.as_deref().unwrap_or("-");
        let winner = session
            .winner()
            .and_then(|w| w.full_name.as_deref())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:>3}  {:<24}  {:<w1$}  {:<w2$}  {:>7}  {}",
            i + 1,
            date,
            truncate_string(&session.display_name(i), MEETING_WIDTH),
            truncate_string(country, COUNTRY_WIDTH),
            session.results.len(),
            winner,
            w1 = MEETING_WIDTH,
            w2 = COUNTRY_WIDTH,
        );
    }

    let report = &aggregate.report;
    let _ = writeln!(
        out,
        "\n{} sessions ({}): {} from cache, {} fetched, {} empty, {} rate limited",
        aggregate.sessions.len(),
        aggregate.source,
        report.from_cache,
        report.fetched,
        report.empty,
        report.rate_limited,
    );
    out
}

pub fn render_standings(data: &ChartData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>3}  {:<w$}  {:>7}", "Pos", "Driver", "Points", w = NAME_WIDTH);
    for (i, (name, points)) in data.standings().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<w$}  {:>7}",
            i + 1,
            truncate_string(name, NAME_WIDTH),
            points,
            w = NAME_WIDTH
        );
    }
    let _ = writeln!(out, "\nAfter {} races", data.race_labels.len());
    out
}

fn render_prime(session_key: i64, outcome: PrimeOutcome) -> String {
    match outcome {
        PrimeOutcome::AlreadyCached => format!("Session {} already cached", session_key),
        PrimeOutcome::Primed { results } => format!("Session {}: cached {} results", session_key, results),
        PrimeOutcome::Empty => format!("Session {}: no results to cache", session_key),
    }
}

/// Render an admin outcome. A failed refetch after clearing is returned as
/// the error so the process exits non-zero.
pub fn render_admin(outcome: AdminOutcome) -> anyhow::Result<String> {
    let text = match outcome {
        AdminOutcome::Cleared { removed, refetch } => {
            let aggregate = refetch?;
            format!(
                "Removed {} cache entries\n{}",
                removed,
                render_sessions(&aggregate)
            )
        }
        AdminOutcome::ClearedExpired { removed } => format!("Removed {} expired cache entries", removed),
        AdminOutcome::Primed(session_key, outcome) => render_prime(session_key, outcome),
        AdminOutcome::PrimedMultiple(outcomes) => outcomes
            .into_iter()
            .map(|(key, outcome)| render_prime(key, outcome))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(text)
}

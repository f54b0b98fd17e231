//! Championship chart data.
//!
//! `transform` turns an aggregate into one cumulative points series per
//! driver, aligned to the season's race order.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Driver, RaceSession};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChartPoint {
    pub race_index: usize,
    /// Running total after this race
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DriverSeries {
    pub driver_number: i64,
    pub driver_name: String,
    pub team_colour: Option<String>,
    /// One point per race, non-decreasing
    pub points: Vec<ChartPoint>,
}

impl DriverSeries {
    pub fn total(&self) -> f64 {
        self.points.last().map(|p| p.points).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChartData {
    /// Drivers in order of first appearance
    pub driver_series: Vec<DriverSeries>,
    pub race_labels: Vec<String>,
}

impl ChartData {
    /// Final totals, highest first; ties ordered by name
    pub fn standings(&self) -> Vec<(String, f64)> {
        let mut standings: Vec<(String, f64)> = self
            .driver_series
            .iter()
            .map(|s| (s.driver_name.clone(), s.total()))
            .collect();
        standings.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        standings
    }
}

struct Accumulator {
    driver_number: i64,
    name: String,
    name_is_fallback: bool,
    team_colour: Option<String>,
    per_race: Vec<f64>,
}

/// Build per-driver cumulative series from sessions in season order.
///
/// Names come from the driver list when it has a last name for the number,
/// else from the last token of the result's full name, else `Driver <n>`.
/// Results without a driver number are skipped.
pub fn transform(sessions: &[RaceSession], drivers: &[Driver]) -> ChartData {
    let race_labels: Vec<String> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| s.display_name(i))
        .collect();

    let by_number: HashMap<i64, &Driver> = drivers
        .iter()
        .filter_map(|d| d.driver_number.map(|n| (n, d)))
        .collect();

    let mut order: Vec<i64> = Vec::new();
    let mut accumulators: HashMap<i64, Accumulator> = HashMap::new();

    for (race_index, session) in sessions.iter().enumerate() {
        for result in &session.results {
            let Some(number) = result.driver_number else {
                continue;
            };
            let driver = by_number.get(&number).copied();

            let acc = accumulators.entry(number).or_insert_with(|| {
                order.push(number);
                Accumulator {
                    driver_number: number,
                    name: format!("Driver {}", number),
                    name_is_fallback: true,
                    team_colour: driver.and_then(Driver::team_colour_hex),
                    per_race: vec![0.0; sessions.len()],
                }
            });

            if acc.name_is_fallback {
                let resolved = driver
                    .and_then(Driver::display_last_name)
                    .or_else(|| result.derived_last_name());
                if let Some(name) = resolved {
                    acc.name = name.to_string();
                    acc.name_is_fallback = false;
                }
            }

            acc.per_race[race_index] = result.points_or_zero();
        }
    }

    let driver_series = order
        .into_iter()
        .filter_map(|number| accumulators.remove(&number))
        .map(|acc| {
            let mut running = 0.0;
            let points = acc
                .per_race
                .iter()
                .enumerate()
                .map(|(race_index, p)| {
                    running += p;
                    ChartPoint {
                        race_index,
                        points: running,
                    }
                })
                .collect();
            DriverSeries {
                driver_number: acc.driver_number,
                driver_name: acc.name,
                team_colour: acc.team_colour,
                points,
            }
        })
        .collect();

    ChartData {
        driver_series,
        race_labels,
    }
}

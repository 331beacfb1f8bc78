//! Time ordering, segment durations and per-country totals

use crate::{AttributedPoint, CountryDuration, Segment};
use chrono::NaiveTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Gaps this long between time-ordered samples usually mean a midnight crossing
const SUSPICIOUS_GAP_SECONDS: f64 = 43_200.0;

/// An attributed point with its parsed time of day
#[derive(Debug, Clone, PartialEq)]
pub struct TimedPoint {
    pub time: NaiveTime,
    pub attributed: AttributedPoint,
}

/// Parses `HH:MM:SS` after trimming surrounding whitespace.
///
/// A seconds field of `60` is accepted as a leap second.
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S").ok()
}

/// Sorts points ascending by time of day. Equal times keep their input order.
///
/// Points whose time text does not parse are dropped.
///
/// Times carry no date, so samples taken after midnight sort ahead of the
/// evening samples of the same flight.
pub fn order_by_time(points: Vec<AttributedPoint>) -> Vec<TimedPoint> {
    let total = points.len();
    let mut timed: Vec<TimedPoint> = points
        .into_iter()
        .filter_map(|attributed| {
            let time = parse_time_of_day(&attributed.point.time_text)?;
            Some(TimedPoint { time, attributed })
        })
        .collect();

    if timed.len() < total {
        debug!(dropped = total - timed.len(), "Dropped points with unparseable time");
    }

    timed.sort_by_key(|point| point.time);
    timed
}

/// One segment per adjacent pair, credited to the earlier point's country.
///
/// A negative delta is taken as a midnight crossing and gets one day added.
/// More than 24 hours between adjacent samples cannot be recovered without
/// dates; such gaps come out short by whole days.
pub fn build_segments(ordered: &[TimedPoint]) -> Vec<Segment> {
    let segments: Vec<Segment> = ordered
        .windows(2)
        .filter_map(|pair| {
            let (current, next) = (&pair[0], &pair[1]);
            let mut delta = (next.time - current.time).num_milliseconds() as f64 / 1000.0;
            if delta < 0.0 {
                delta += SECONDS_PER_DAY;
            }
            if !delta.is_finite() || delta < 0.0 {
                return None;
            }
            Some(Segment {
                country: current.attributed.country.clone(),
                duration_seconds: delta,
            })
        })
        .collect();

    let long_gaps = segments
        .iter()
        .filter(|segment| segment.duration_seconds >= SUSPICIOUS_GAP_SECONDS)
        .count();
    if long_gaps > 0 {
        warn!(
            long_gaps,
            "Track has a gap of 12 hours or more; it probably crosses midnight and totals are overstated"
        );
    }

    debug!(segments = segments.len(), "Built time segments");
    segments
}

/// Sums segment durations per country, longest first, ties by name.
pub fn aggregate_by_country(segments: &[Segment]) -> Vec<CountryDuration> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for segment in segments {
        *totals.entry(segment.country.as_str()).or_insert(0.0) += segment.duration_seconds;
    }

    let mut durations: Vec<CountryDuration> = totals
        .into_iter()
        .map(|(country, total_seconds)| CountryDuration {
            country: country.to_string(),
            total_seconds,
        })
        .collect();

    durations.sort_by(|a, b| {
        b.total_seconds
            .total_cmp(&a.total_seconds)
            .then_with(|| a.country.cmp(&b.country))
    });
    durations
}

/// Formats seconds as `D days HH:MM:SS`, with microseconds only when present.
pub fn format_duration(total_seconds: f64) -> String {
    let micros = (total_seconds.max(0.0) * 1_000_000.0).round() as u64;
    let whole = micros / 1_000_000;
    let fraction = micros % 1_000_000;

    let days = whole / 86_400;
    let hours = (whole % 86_400) / 3_600;
    let minutes = (whole % 3_600) / 60;
    let seconds = whole % 60;

    let mut formatted = format!("{days} days {hours:02}:{minutes:02}:{seconds:02}");
    if fraction > 0 {
        formatted.push_str(&format!(".{fraction:06}"));
    }
    formatted
}

/// One line of the country-duration report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub country: String,
    pub total_seconds: f64,
    pub formatted_duration: String,
}

/// Final report, rows sorted longest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryReport {
    pub rows: Vec<ReportRow>,
}

impl CountryReport {
    pub fn from_totals(totals: Vec<CountryDuration>) -> Self {
        let rows = totals
            .into_iter()
            .map(|total| ReportRow {
                formatted_duration: format_duration(total.total_seconds),
                country: total.country,
                total_seconds: total.total_seconds,
            })
            .collect();
        Self { rows }
    }

    pub fn total_seconds(&self) -> f64 {
        self.rows.iter().map(|row| row.total_seconds).sum()
    }
}

impl fmt::Display for CountryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|row| row.country.chars().count())
            .max()
            .unwrap_or(0)
            .max("country".len());

        writeln!(f, "{:<width$}  {:>13}  {}", "country", "total_seconds", "duration")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<width$}  {:>13.1}  {}",
                row.country, row.total_seconds, row.formatted_duration
            )?;
        }
        Ok(())
    }
}

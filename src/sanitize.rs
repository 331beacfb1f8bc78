//! Coordinate sanitization

use crate::{RawRecord, SanitizedPoint};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn non_numeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9.\-]+").expect("coordinate pattern is valid"))
}

/// Strips everything but digits, `.` and `-`, then parses what is left.
///
/// Returns `None` for text that does not reduce to a finite number.
pub fn clean_coordinate(text: &str) -> Option<f64> {
    let cleaned = non_numeric().replace_all(text, "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Keeps the records whose latitude and longitude both parse, in input order.
pub fn sanitize_records(records: &[RawRecord]) -> Vec<SanitizedPoint> {
    let points: Vec<SanitizedPoint> = records
        .iter()
        .filter_map(|record| {
            let latitude = clean_coordinate(&record.latitude)?;
            let longitude = clean_coordinate(&record.longitude)?;
            Some(SanitizedPoint {
                time_text: record.time.clone(),
                latitude,
                longitude,
            })
        })
        .collect();

    debug!(
        kept = points.len(),
        dropped = records.len() - points.len(),
        "Sanitized coordinates"
    );
    points
}

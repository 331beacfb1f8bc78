//! # Rust Flight Borders
//!
//! Turns a rendered flight track-log page into time-stamped positions and
//! attributes the elapsed flight time to the country each stretch of the
//! flight was flown over.
//!
//! The pipeline is a chain of pure stages:
//!
//! 1. [`anchors`] finds the row anchors (the most frequent weekday label).
//! 2. [`extract`] slices time/latitude/longitude windows at fixed offsets.
//! 3. [`records`] persists the raw record table as CSV.
//! 4. [`sanitize`] coerces the coordinate text to numbers.
//! 5. [`countries`] joins each point against country polygons.
//! 6. [`segments`] orders points in time, builds segments and sums them per country.
//!
//! # Example
//! ```rust
//! use rust_flight_borders::{
//!     attribute_time, extract_records, CountryIndex, Markup, OffsetLayout, WeekdayAnchorLocator,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let countries = CountryIndex::from_geojson_str(r#"{
//!     "type": "FeatureCollection",
//!     "crs": { "type": "name", "properties": { "name": "EPSG:4326" } },
//!     "features": [{
//!         "type": "Feature",
//!         "properties": { "NAME": "Squareland" },
//!         "geometry": { "type": "Polygon",
//!             "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]] }
//!     }]
//! }"#, "NAME", None)?;
//!
//! let layout = OffsetLayout { time_len: 8, to_lat: 1, lat_len: 3, to_long: 1, long_len: 3 };
//! let markup = Markup::new("Mon 10:00:00 5.0 5.0 Mon 10:10:00 6.0 6.0 ");
//! let records = extract_records(&markup, &WeekdayAnchorLocator::default(), &layout)?;
//! let report = attribute_time(&records, &countries)?;
//!
//! assert_eq!(report.rows[0].country, "Squareland");
//! assert_eq!(report.rows[0].total_seconds, 600.0);
//! # Ok(())
//! # }
//! ```

pub mod anchors;
pub mod config;
pub mod countries;
pub mod extract;
pub mod map;
pub mod records;
pub mod sanitize;
pub mod segments;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

// Re-export main types for convenience
pub use anchors::{AnchorLocator, AnchorMatch, Markup, WeekdayAnchorLocator, WEEKDAY_LABELS};
pub use config::PipelineConfig;
pub use countries::{CountryIndex, CountryPolygon, Crs, OFFSHORE};
pub use extract::{extract_record, extract_records, OffsetLayout};
pub use map::TrackOverview;
pub use records::{read_record_table, write_record_table};
pub use sanitize::{clean_coordinate, sanitize_records};
pub use segments::{
    aggregate_by_country, build_segments, format_duration, order_by_time, parse_time_of_day,
    CountryReport, ReportRow, TimedPoint,
};

/// Error types for the flight border pipeline
#[derive(Error, Debug)]
pub enum FlightTrackError {
    #[error("No weekday anchors found in the rendered markup; the page layout is not a track log")]
    NoAnchorsFound,

    #[error("No valid rows left after cleaning time/latitude/longitude")]
    NoValidRows,

    #[error("Polygon dataset declares no coordinate reference system")]
    MissingCrs,

    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Polygon dataset is unusable: {0}")]
    DatasetError(String),

    #[error("Record table error: {0}")]
    RecordTableError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// One row of the record table, exactly as sliced out of the markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub time: String,
    pub latitude: String,
    pub longitude: String,
}

/// A record whose coordinates parsed to finite numbers.
///
/// Latitude and longitude ranges are not checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedPoint {
    pub time_text: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A sanitized point labelled with the country it lies in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedPoint {
    pub point: SanitizedPoint,
    pub country: String,
}

/// Time from one sample to the next, credited to the earlier sample's country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub country: String,
    pub duration_seconds: f64,
}

/// Total time spent over one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryDuration {
    pub country: String,
    pub total_seconds: f64,
}

/// Runs the anchor locator and field extractor over the markup.
///
/// Fails with [`FlightTrackError::NoAnchorsFound`] when the locator yields nothing.
#[instrument(level = "info", skip_all, fields(markup_chars = markup.char_len()))]
pub fn extract_track(
    markup: &Markup,
    layout: &OffsetLayout,
) -> Result<Vec<RawRecord>, FlightTrackError> {
    extract_records(markup, &WeekdayAnchorLocator::default(), layout)
}

/// Attributes elapsed time to countries for an extracted record table.
///
/// Rows with unusable coordinates or time text are dropped; if none survive
/// the run fails with [`FlightTrackError::NoValidRows`].
///
/// Points are ordered by time of day before segmenting, so a track that
/// crosses midnight is reassembled with the after-midnight samples first.
/// The result then counts the span from the earliest to the latest clock
/// time (close to a full day) instead of the real flight time. A warning is
/// logged when the ordered track has a gap of twelve hours or more.
#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub fn attribute_time(
    records: &[RawRecord],
    countries: &CountryIndex,
) -> Result<CountryReport, FlightTrackError> {
    let sanitized = sanitize_records(records);

    let points: Vec<SanitizedPoint> = sanitized
        .into_iter()
        .map(|mut point| {
            point.time_text = point.time_text.trim().to_string();
            point
        })
        .filter(|point| parse_time_of_day(&point.time_text).is_some())
        .collect();

    debug!(
        usable = points.len(),
        dropped = records.len() - points.len(),
        "Cleaned time/latitude/longitude"
    );

    if points.is_empty() {
        return Err(FlightTrackError::NoValidRows);
    }

    let attributed = countries.attribute(points);
    let ordered = order_by_time(attributed);
    let segments = build_segments(&ordered);
    let totals = aggregate_by_country(&segments);

    info!(
        points = ordered.len(),
        segments = segments.len(),
        countries = totals.len(),
        "Time attributed to countries"
    );

    Ok(CountryReport::from_totals(totals))
}

//! Fixed-offset field extraction
//!
//! Each field sits a fixed number of characters after the end of the
//! previous one: anchor, one separator, time, `to_lat`, latitude,
//! `to_long`, longitude. Windows running past the end of the markup are
//! truncated rather than rejected.

use crate::anchors::{AnchorLocator, AnchorMatch, Markup};
use crate::{FlightTrackError, RawRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Character lengths and hops of the track-log row layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetLayout {
    /// Length of the time window, e.g. 8 for `01:53:18`
    pub time_len: usize,
    /// Hop from the end of the time window to the latitude window
    pub to_lat: usize,
    pub lat_len: usize,
    /// Hop from the end of the latitude window to the longitude window
    pub to_long: usize,
    pub long_len: usize,
}

impl Default for OffsetLayout {
    /// Layout of the FlightAware track-log table
    fn default() -> Self {
        Self {
            time_len: 8,
            to_lat: 116,
            lat_len: 7,
            to_long: 114,
            long_len: 8,
        }
    }
}

/// Slices one raw record out of the markup for the given anchor
pub fn extract_record(markup: &Markup, anchor: AnchorMatch, layout: &OffsetLayout) -> RawRecord {
    let start = anchor.end.saturating_add(1);
    let end = start.saturating_add(layout.time_len);
    let time = markup.slice_chars(start, end);

    let start = end.saturating_add(layout.to_lat);
    let end = start.saturating_add(layout.lat_len);
    let latitude = markup.slice_chars(start, end);

    let start = end.saturating_add(layout.to_long);
    let end = start.saturating_add(layout.long_len);
    // closing tags bleed into the longitude window
    let longitude: String = markup
        .slice_chars(start, end)
        .chars()
        .filter(|c| *c != '<' && *c != '/')
        .collect();

    RawRecord {
        time: time.to_string(),
        latitude: latitude.to_string(),
        longitude,
    }
}

/// Locates the anchors and extracts one record per anchor, in anchor order.
pub fn extract_records(
    markup: &Markup,
    locator: &dyn AnchorLocator,
    layout: &OffsetLayout,
) -> Result<Vec<RawRecord>, FlightTrackError> {
    let anchors = locator.locate_anchors(markup);
    if anchors.is_empty() {
        return Err(FlightTrackError::NoAnchorsFound);
    }

    let records: Vec<RawRecord> = anchors
        .iter()
        .map(|anchor| extract_record(markup, *anchor, layout))
        .collect();

    if let Some(first) = records.first() {
        debug!(time = %first.time, latitude = %first.latitude, longitude = %first.longitude, "First extracted row");
    }
    info!(records = records.len(), "Extracted raw records");

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::WeekdayAnchorLocator;

    fn small_layout() -> OffsetLayout {
        OffsetLayout {
            time_len: 8,
            to_lat: 4,
            lat_len: 5,
            to_long: 4,
            long_len: 9,
        }
    }

    #[test]
    fn test_default_layout() {
        let layout = OffsetLayout::default();
        assert_eq!(layout.time_len, 8);
        assert_eq!(layout.to_lat, 116);
        assert_eq!(layout.lat_len, 7);
        assert_eq!(layout.to_long, 114);
        assert_eq!(layout.long_len, 8);
    }

    #[test]
    fn test_chained_windows() {
        let markup = Markup::new("Tue 01:53:18<td>51.47<td>-0.4543</td>");
        let anchor = AnchorMatch { start: 0, end: 3 };
        let record = extract_record(&markup, anchor, &small_layout());
        assert_eq!(record.time, "01:53:18");
        assert_eq!(record.latitude, "51.47");
        assert_eq!(record.longitude, "-0.4543");
    }

    #[test]
    fn test_only_longitude_is_stripped() {
        let layout = OffsetLayout {
            time_len: 3,
            to_lat: 0,
            lat_len: 3,
            to_long: 0,
            long_len: 3,
        };
        let markup = Markup::new("Fri</a</b</c");
        let record = extract_record(&markup, AnchorMatch { start: 0, end: 3 }, &layout);
        assert_eq!(record.time, "/a<");
        assert_eq!(record.latitude, "/b<");
        assert_eq!(record.longitude, "c");
    }

    #[test]
    fn test_truncates_at_end_of_input() {
        let markup = Markup::new("xx Sun 12:0");
        let anchor = AnchorMatch { start: 3, end: 6 };
        let record = extract_record(&markup, anchor, &OffsetLayout::default());
        assert_eq!(record.time, "12:0");
        assert_eq!(record.latitude, "");
        assert_eq!(record.longitude, "");

        let past_end = AnchorMatch { start: 100, end: usize::MAX };
        let record = extract_record(&markup, past_end, &OffsetLayout::default());
        assert!(record.time.is_empty());
        assert!(record.latitude.is_empty());
        assert!(record.longitude.is_empty());
    }

    #[test]
    fn test_extract_records_without_anchors() {
        let markup = Markup::new("<table></table>");
        let result = extract_records(&markup, &WeekdayAnchorLocator::default(), &small_layout());
        assert!(matches!(result, Err(FlightTrackError::NoAnchorsFound)));
    }

    #[test]
    fn test_extract_records_keeps_anchor_order_and_duplicates() {
        let row = "Wed 10:00:00<td>12.34<td>56.78</td>";
        let markup = Markup::new(format!("{row}{row}"));
        let records =
            extract_records(&markup, &WeekdayAnchorLocator::default(), &small_layout()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], records[1]);
        assert_eq!(records[0].longitude, "56.78td");
    }
}

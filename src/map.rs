//! Track overview export
//!
//! A viewer-neutral picture of the track: every sample as a point, the
//! samples joined in row order, and the mean position as the map center.
//! Written as GeoJSON so any map viewer can render it.

use crate::{sanitize_records, FlightTrackError, RawRecord, SanitizedPoint};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackOverview {
    /// Mean (latitude, longitude) of all samples
    pub center: (f64, f64),
    /// Samples in row order, not time order
    pub points: Vec<SanitizedPoint>,
}

impl TrackOverview {
    /// Builds the overview from the record table.
    ///
    /// Only the coordinates need to parse; the time text is carried as-is.
    pub fn from_records(records: &[RawRecord]) -> Result<Self, FlightTrackError> {
        let points = sanitize_records(records);
        if points.is_empty() {
            return Err(FlightTrackError::NoValidRows);
        }

        let count = points.len() as f64;
        let center = (
            points.iter().map(|p| p.latitude).sum::<f64>() / count,
            points.iter().map(|p| p.longitude).sum::<f64>() / count,
        );
        debug!(points = points.len(), center_lat = center.0, center_lon = center.1, "Built track overview");

        Ok(Self { center, points })
    }

    /// The polyline through all samples as `[longitude, latitude]` positions
    pub fn polyline(&self) -> Vec<Vec<f64>> {
        self.points
            .iter()
            .map(|p| vec![p.longitude, p.latitude])
            .collect()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.points.len() + 2);

        for (i, point) in self.points.iter().enumerate() {
            let mut properties = JsonObject::new();
            properties.insert("role".to_string(), "sample".into());
            properties.insert("index".to_string(), i.into());
            properties.insert("time".to_string(), point.time_text.clone().into());
            properties.insert("latitude".to_string(), point.latitude.into());
            properties.insert("longitude".to_string(), point.longitude.into());
            features.push(feature(Value::Point(vec![point.longitude, point.latitude]), properties));
        }

        let mut properties = JsonObject::new();
        properties.insert("role".to_string(), "track".into());
        features.push(feature(Value::LineString(self.polyline()), properties));

        let mut properties = JsonObject::new();
        properties.insert("role".to_string(), "center".into());
        features.push(feature(Value::Point(vec![self.center.1, self.center.0]), properties));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    pub fn write_geojson(&self, path: &Path) -> Result<(), FlightTrackError> {
        let json = serde_json::to_string_pretty(&self.to_feature_collection())?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Wrote track overview");
        Ok(())
    }
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

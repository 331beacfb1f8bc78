//! Country polygons and point attribution
//!
//! Polygons come from a GeoJSON FeatureCollection (Natural Earth admin-0
//! countries, for instance). They are reprojected to WGS84 on load and
//! indexed by bounding rectangle, so a lookup only runs the exact
//! point-in-polygon test against the few candidates whose box covers the
//! point.

use crate::{AttributedPoint, FlightTrackError, SanitizedPoint};
use geo::{BoundingRect, Contains, Coord, MapCoords, MultiPolygon, Point};
use geojson::{FeatureCollection, GeoJson};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Label for points not inside any country polygon
pub const OFFSHORE: &str = "Offshore";

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Coordinate reference systems the dataset loader can bring to WGS84
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326 / OGC CRS84, longitude-latitude degrees
    Wgs84,
    /// EPSG:3857, spherical Web Mercator metres
    WebMercator,
}

impl Crs {
    /// Parses a CRS identifier such as `EPSG:4326`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` or `urn:ogc:def:crs:EPSG::3857`.
    pub fn from_name(name: &str) -> Result<Self, FlightTrackError> {
        let upper = name.trim().to_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Crs::Wgs84);
        }
        let code = upper
            .rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok());
        match code {
            Some(code) => Self::from_epsg(code),
            None => Err(FlightTrackError::UnsupportedCrs(name.to_string())),
        }
    }

    pub fn from_epsg(code: u32) -> Result<Self, FlightTrackError> {
        match code {
            4326 => Ok(Crs::Wgs84),
            3857 | 900913 => Ok(Crs::WebMercator),
            other => Err(FlightTrackError::UnsupportedCrs(format!("EPSG:{other}"))),
        }
    }

    /// Reads the legacy top-level `crs` member of a GeoJSON document.
    ///
    /// `Ok(None)` when the document declares no CRS at all.
    fn from_member(member: Option<&Value>) -> Result<Option<Self>, FlightTrackError> {
        let Some(member) = member else {
            return Ok(None);
        };
        if member.is_null() {
            return Ok(None);
        }

        let properties = member.get("properties");
        match member.get("type").and_then(Value::as_str) {
            Some("name") => {
                let name = properties
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        FlightTrackError::UnsupportedCrs(format!("named crs without a name: {member}"))
                    })?;
                Self::from_name(name).map(Some)
            }
            Some("EPSG") => {
                let code = properties
                    .and_then(|p| p.get("code"))
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        FlightTrackError::UnsupportedCrs(format!("EPSG crs without a code: {member}"))
                    })?;
                let code = u32::try_from(code)
                    .map_err(|_| FlightTrackError::UnsupportedCrs(format!("EPSG:{code}")))?;
                Self::from_epsg(code).map(Some)
            }
            _ => Err(FlightTrackError::UnsupportedCrs(member.to_string())),
        }
    }

    fn to_wgs84(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 => coord,
            Crs::WebMercator => Coord {
                x: (coord.x / WEB_MERCATOR_RADIUS).to_degrees(),
                y: (2.0 * (coord.y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2)
                    .to_degrees(),
            },
        }
    }
}

/// One named country outline, in WGS84
#[derive(Debug, Clone)]
pub struct CountryPolygon {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl CountryPolygon {
    pub fn from_geometry(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    fn contains(&self, point: &Point<f64>) -> bool {
        // strict interior: points on the border count as outside
        self.geometry.contains(point)
    }
}

type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Immutable, indexed country dataset. Load once and share across runs.
pub struct CountryIndex {
    polygons: Vec<CountryPolygon>,
    tree: RTree<IndexedBox>,
}

impl fmt::Debug for CountryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountryIndex")
            .field("countries", &self.polygons.len())
            .finish()
    }
}

impl CountryIndex {
    /// Builds the index from polygons that are already in WGS84.
    pub fn from_polygons(polygons: Vec<CountryPolygon>) -> Self {
        let boxes: Vec<IndexedBox> = polygons
            .iter()
            .enumerate()
            .filter_map(|(idx, polygon)| {
                let rect = polygon.geometry.bounding_rect()?;
                let (min, max) = (rect.min(), rect.max());
                Some(GeomWithData::new(
                    Rectangle::from_corners([min.x, min.y], [max.x, max.y]),
                    idx,
                ))
            })
            .collect();

        Self {
            polygons,
            tree: RTree::bulk_load(boxes),
        }
    }

    /// Parses a GeoJSON FeatureCollection.
    ///
    /// `name_column` is the feature property holding the country name.
    /// `declared_crs` applies only when the document carries no `crs` member;
    /// with neither, the dataset is rejected.
    pub fn from_geojson_str(
        text: &str,
        name_column: &str,
        declared_crs: Option<&str>,
    ) -> Result<Self, FlightTrackError> {
        let collection = match text.parse::<GeoJson>() {
            Ok(GeoJson::FeatureCollection(collection)) => collection,
            Ok(_) => {
                return Err(FlightTrackError::DatasetError(
                    "expected a GeoJSON FeatureCollection".to_string(),
                ))
            }
            Err(e) => return Err(FlightTrackError::DatasetError(e.to_string())),
        };

        let crs_member = collection
            .foreign_members
            .as_ref()
            .and_then(|members| members.get("crs"));
        let crs = match (Crs::from_member(crs_member)?, declared_crs) {
            (Some(crs), _) => crs,
            (None, Some(name)) => Crs::from_name(name)?,
            (None, None) => return Err(FlightTrackError::MissingCrs),
        };
        debug!(crs = ?crs, "Resolved dataset CRS");

        let polygons = Self::collect_polygons(collection, name_column, crs);
        if polygons.is_empty() {
            return Err(FlightTrackError::DatasetError(format!(
                "no polygon features with a '{name_column}' name"
            )));
        }

        info!(countries = polygons.len(), "Loaded country polygons");
        Ok(Self::from_polygons(polygons))
    }

    pub fn from_geojson_file(
        path: &Path,
        name_column: &str,
        declared_crs: Option<&str>,
    ) -> Result<Self, FlightTrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text, name_column, declared_crs)
    }

    fn collect_polygons(
        collection: FeatureCollection,
        name_column: &str,
        crs: Crs,
    ) -> Vec<CountryPolygon> {
        let mut polygons = Vec::new();

        for (i, feature) in collection.features.into_iter().enumerate() {
            let name = feature
                .property(name_column)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            let Some(name) = name else {
                warn!(feature = i, column = name_column, "Skipping feature without a name");
                continue;
            };

            let geometry = feature
                .geometry
                .and_then(|geometry| geo::Geometry::<f64>::try_from(geometry).ok());
            let multi = match geometry {
                Some(geo::Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
                Some(geo::Geometry::MultiPolygon(multi)) => multi,
                _ => {
                    warn!(feature = i, country = %name, "Skipping feature without polygon geometry");
                    continue;
                }
            };

            let geometry = multi.map_coords(|coord| crs.to_wgs84(coord));
            polygons.push(CountryPolygon::from_geometry(name, geometry));
        }

        polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Name of the country containing the point, if any.
    ///
    /// When polygons overlap, the one listed first in the dataset wins.
    pub fn country_at(&self, latitude: f64, longitude: f64) -> Option<&str> {
        let point = Point::new(longitude, latitude);
        self.tree
            .locate_all_at_point(&[longitude, latitude])
            .map(|candidate| candidate.data)
            .filter(|&idx| self.polygons[idx].contains(&point))
            .min()
            .map(|idx| self.polygons[idx].name.as_str())
    }

    /// Labels every point with its country, or [`OFFSHORE`].
    pub fn attribute(&self, points: Vec<SanitizedPoint>) -> Vec<AttributedPoint> {
        let attributed: Vec<AttributedPoint> = points
            .into_iter()
            .map(|point| {
                let country = self
                    .country_at(point.latitude, point.longitude)
                    .unwrap_or(OFFSHORE)
                    .to_string();
                AttributedPoint { point, country }
            })
            .collect();

        debug!(
            points = attributed.len(),
            offshore = attributed.iter().filter(|p| p.country == OFFSHORE).count(),
            "Attributed points to countries"
        );
        attributed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
        .into()
    }

    fn point(lat: f64, long: f64) -> SanitizedPoint {
        SanitizedPoint {
            time_text: "00:00:00".to_string(),
            latitude: lat,
            longitude: long,
        }
    }

    fn collection(crs: &str, coordinates: &str) -> String {
        format!(
            r#"{{
                "type": "FeatureCollection",
                {crs}
                "features": [
                    {{ "type": "Feature", "properties": {{ "NAME": "Alpha", "ISO": "AL" }},
                       "geometry": {{ "type": "Polygon", "coordinates": {coordinates} }} }},
                    {{ "type": "Feature", "properties": {{ "NAME": null }},
                       "geometry": {{ "type": "Polygon", "coordinates": {coordinates} }} }},
                    {{ "type": "Feature", "properties": {{ "NAME": "Line" }},
                       "geometry": {{ "type": "LineString", "coordinates": [[0, 0], [1, 1]] }} }}
                ]
            }}"#
        )
    }

    const DEGREE_SQUARE: &str = "[[[10, 10], [20, 10], [20, 20], [10, 20], [10, 10]]]";

    #[test]
    fn test_crs_names() {
        assert_eq!(Crs::from_name("EPSG:4326").unwrap(), Crs::Wgs84);
        assert_eq!(Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(), Crs::Wgs84);
        assert_eq!(Crs::from_name("urn:ogc:def:crs:EPSG::3857").unwrap(), Crs::WebMercator);
        assert!(matches!(
            Crs::from_name("EPSG:27700"),
            Err(FlightTrackError::UnsupportedCrs(_))
        ));
        assert!(Crs::from_name("somewhere").is_err());
    }

    #[test]
    fn test_web_mercator_to_wgs84() {
        let origin = Crs::WebMercator.to_wgs84(Coord { x: 0.0, y: 0.0 });
        assert!(origin.x.abs() < 1e-9 && origin.y.abs() < 1e-9);

        // 180 degrees of longitude is half the equator
        let edge = Crs::WebMercator.to_wgs84(Coord {
            x: std::f64::consts::PI * WEB_MERCATOR_RADIUS,
            y: 0.0,
        });
        assert!((edge.x - 180.0).abs() < 1e-9);

        let london = Crs::WebMercator.to_wgs84(Coord { x: -50_575.0, y: 6_704_840.0 });
        assert!((london.x - -0.4543).abs() < 1e-3);
        assert!((london.y - 51.47).abs() < 1e-2);
    }

    #[test]
    fn test_point_lookup() {
        let index = CountryIndex::from_polygons(vec![
            CountryPolygon::from_geometry("West", square(0.0, 0.0, 10.0)),
            CountryPolygon::from_geometry("East", square(10.0, 0.0, 10.0)),
        ]);
        assert_eq!(index.country_at(5.0, 5.0), Some("West"));
        assert_eq!(index.country_at(5.0, 15.0), Some("East"));
        assert_eq!(index.country_at(50.0, 50.0), None);
        // shared border belongs to neither
        assert_eq!(index.country_at(5.0, 10.0), None);
    }

    #[test]
    fn test_overlap_prefers_first_polygon() {
        let index = CountryIndex::from_polygons(vec![
            CountryPolygon::from_geometry("Big", square(0.0, 0.0, 10.0)),
            CountryPolygon::from_geometry("Small", square(4.0, 4.0, 2.0)),
        ]);
        assert_eq!(index.country_at(5.0, 5.0), Some("Big"));
    }

    #[test]
    fn test_attribute_labels_offshore() {
        let index = CountryIndex::from_polygons(vec![CountryPolygon::from_geometry(
            "Land",
            square(0.0, 0.0, 10.0),
        )]);
        let attributed = index.attribute(vec![point(5.0, 5.0), point(-30.0, -30.0)]);
        assert_eq!(attributed[0].country, "Land");
        assert_eq!(attributed[1].country, OFFSHORE);
        assert!(attributed.iter().all(|p| !p.country.is_empty()));
    }

    #[test]
    fn test_load_geojson_skips_unusable_features() {
        let text = collection(
            r#""crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },"#,
            DEGREE_SQUARE,
        );
        let index = CountryIndex::from_geojson_str(&text, "NAME", None).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.country_at(15.0, 15.0), Some("Alpha"));

        let by_iso = CountryIndex::from_geojson_str(&text, "ISO", None).unwrap();
        assert_eq!(by_iso.country_at(15.0, 15.0), Some("AL"));
    }

    #[test]
    fn test_missing_crs_is_fatal() {
        let text = collection("", DEGREE_SQUARE);
        let result = CountryIndex::from_geojson_str(&text, "NAME", None);
        assert!(matches!(result, Err(FlightTrackError::MissingCrs)));

        let declared = CountryIndex::from_geojson_str(&text, "NAME", Some("EPSG:4326")).unwrap();
        assert_eq!(declared.country_at(15.0, 15.0), Some("Alpha"));
    }

    #[test]
    fn test_epsg_member_and_reprojection() {
        // roughly 10..20 degrees expressed in Web Mercator metres
        let metres = "[[[1113195, 1118890], [2226390, 1118890], [2226390, 2273031], [1113195, 2273031], [1113195, 1118890]]]";
        let text = collection(r#""crs": { "type": "EPSG", "properties": { "code": 3857 } },"#, metres);
        let index = CountryIndex::from_geojson_str(&text, "NAME", None).unwrap();
        assert_eq!(index.country_at(15.0, 15.0), Some("Alpha"));
        assert_eq!(index.country_at(25.0, 15.0), None);
    }

    #[test]
    fn test_unsupported_crs_member() {
        let text = collection(
            r#""crs": { "type": "name", "properties": { "name": "EPSG:2154" } },"#,
            DEGREE_SQUARE,
        );
        let result = CountryIndex::from_geojson_str(&text, "NAME", Some("EPSG:4326"));
        assert!(matches!(result, Err(FlightTrackError::UnsupportedCrs(_))));
    }

    #[test]
    fn test_dataset_errors() {
        let text = collection(r#""crs": { "type": "name", "properties": { "name": "EPSG:4326" } },"#, DEGREE_SQUARE);
        assert!(matches!(
            CountryIndex::from_geojson_str(&text, "ADMIN", None),
            Err(FlightTrackError::DatasetError(_))
        ));
        assert!(matches!(
            CountryIndex::from_geojson_str("not json", "NAME", None),
            Err(FlightTrackError::DatasetError(_))
        ));
        assert!(matches!(
            CountryIndex::from_geojson_str(r#"{ "type": "Point", "coordinates": [0, 0] }"#, "NAME", None),
            Err(FlightTrackError::DatasetError(_))
        ));
    }
}

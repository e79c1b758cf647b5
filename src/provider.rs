//! Sources of landmark geometry.

use crate::geometry::{GeoBounds, GeoPoint, Geometry};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;
use uom::si::{f64::Length, length::meter, ratio::ratio};

/// Meters spanned by one degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read landmark data: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse landmark data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected a FeatureCollection, found {0}")]
    NotAFeatureCollection(String),
}

/// Supplies landmark geometry for a region.
pub trait GeometryProvider {
    /// Returns the geometries touching `bounds` whose tags include any of `tags`.
    ///
    /// An empty `tags` slice selects every geometry.
    fn fetch_landmarks(&self, bounds: &GeoBounds, tags: &[String])
    -> Result<Vec<Geometry>, FetchError>;
}

/// The circular region a vehicle operates in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MissionArea {
    center: GeoPoint,
    radius: Length,
}

impl MissionArea {
    pub fn new(center: GeoPoint, radius: Length) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn radius(&self) -> Length {
        self.radius
    }

    /// Returns the geodetic bounds enclosing the area.
    ///
    /// Uses an equirectangular approximation which holds for mission sized radii away from the
    /// poles.
    pub fn bounds(&self) -> GeoBounds {
        let radius = self.radius.get::<meter>();
        let dlat = radius / METERS_PER_DEGREE;
        let dlon = radius
            / (METERS_PER_DEGREE * self.center.latitude().cos().get::<ratio>().max(1e-9));
        let (lat, lon) = (self.center.latitude_deg(), self.center.longitude_deg());

        GeoBounds::new(
            GeoPoint::from_degrees(lat - dlat, lon - dlon),
            GeoPoint::from_degrees(lat + dlat, lon + dlon),
        )
    }
}

/// Reads landmarks from a GeoJSON `FeatureCollection` on disk.
///
/// Supports `Point`, `Polygon` and `MultiPolygon` geometries. Only outer rings are kept and
/// every polygon of a `MultiPolygon` becomes its own landmark. Tags are the keys of a
/// feature's `properties`, so `"building"` selects `{"building": "yes"}`.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoJsonProvider {
    path: PathBuf,
}

impl GeoJsonProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the geometries of a GeoJSON document held in memory.
    pub fn parse(
        json: &str,
        bounds: &GeoBounds,
        tags: &[String],
    ) -> Result<Vec<Geometry>, FetchError> {
        Self::select(serde_json::from_str(json)?, bounds, tags)
    }

    fn select(
        collection: FeatureCollection,
        bounds: &GeoBounds,
        tags: &[String],
    ) -> Result<Vec<Geometry>, FetchError> {
        if collection.kind != "FeatureCollection" {
            return Err(FetchError::NotAFeatureCollection(collection.kind));
        }

        Ok(collection
            .features
            .into_iter()
            .filter(|feature| feature.has_any_tag(tags))
            .filter_map(|feature| feature.geometry)
            .flat_map(RawGeometry::into_geometries)
            .filter(|geometry| bounds.touches(geometry))
            .collect())
    }
}

impl GeometryProvider for GeoJsonProvider {
    fn fetch_landmarks(
        &self,
        bounds: &GeoBounds,
        tags: &[String],
    ) -> Result<Vec<Geometry>, FetchError> {
        let reader = BufReader::new(File::open(&self.path)?);
        Self::select(serde_json::from_reader(reader)?, bounds, tags)
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Value>,
}

impl RawFeature {
    fn has_any_tag(&self, tags: &[String]) -> bool {
        if tags.is_empty() {
            return true;
        }

        match &self.properties {
            Some(Value::Object(properties)) => tags.iter().any(|tag| {
                properties
                    .get(tag)
                    .is_some_and(|value| !value.is_null() && value != &Value::Bool(false))
            }),
            _ => false,
        }
    }
}

/// GeoJSON positions are `[longitude, latitude]` with an optional altitude.
type Position = Vec<f64>;

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl RawGeometry {
    /// Converts supported geometry types, dropping anything else.
    fn into_geometries(self) -> Vec<Geometry> {
        let geometries: Result<Vec<Geometry>, serde_json::Error> = match self.kind.as_str() {
            "Point" => serde_json::from_value::<Position>(self.coordinates)
                .map(|position| to_point(&position).map(Geometry::Point).into_iter().collect()),
            "Polygon" => serde_json::from_value::<Vec<Vec<Position>>>(self.coordinates)
                .map(|rings| outer_ring(rings).into_iter().collect()),
            "MultiPolygon" => serde_json::from_value::<Vec<Vec<Vec<Position>>>>(self.coordinates)
                .map(|polygons| polygons.into_iter().filter_map(outer_ring).collect()),
            kind => {
                debug!("skipping unsupported {kind} geometry");
                return Vec::new();
            }
        };

        geometries.unwrap_or_else(|err| {
            debug!("skipping malformed {} geometry: {err}", self.kind);
            Vec::new()
        })
    }
}

fn to_point(position: &Position) -> Option<GeoPoint> {
    match position.as_slice() {
        [lon, lat, ..] => Some(GeoPoint::from_degrees(*lat, *lon)),
        _ => None,
    }
}

fn outer_ring(rings: Vec<Vec<Position>>) -> Option<Geometry> {
    let ring: Vec<GeoPoint> = rings.first()?.iter().filter_map(to_point).collect();
    match ring.is_empty() {
        true => None,
        false => Some(Geometry::Polygon(ring)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "building": "yes" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[8.54, 47.37], [8.55, 47.37], [8.55, 47.38], [8.54, 47.37]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "amenity": "fountain" },
                "geometry": { "type": "Point", "coordinates": [8.541, 47.376] }
            },
            {
                "type": "Feature",
                "properties": { "waterway": "river" },
                "geometry": { "type": "LineString", "coordinates": [[8.54, 47.37], [8.55, 47.38]] }
            },
            {
                "type": "Feature",
                "properties": { "building": "yes" },
                "geometry": { "type": "Point", "coordinates": [9.5, 46.0] }
            },
            {
                "type": "Feature",
                "properties": { "building": null },
                "geometry": { "type": "Point", "coordinates": [8.545, 47.375] }
            }
        ]
    }"#;

    fn bounds() -> GeoBounds {
        GeoBounds::new(
            GeoPoint::from_degrees(47.3, 8.5),
            GeoPoint::from_degrees(47.4, 8.6),
        )
    }

    #[test]
    fn tags_select_features() {
        let geometries = GeoJsonProvider::parse(COLLECTION, &bounds(), &["building".into()]).unwrap();
        assert_eq!(geometries.len(), 1);
        assert!(matches!(&geometries[0], Geometry::Polygon(ring) if ring.len() == 4));
    }

    #[test]
    fn no_tags_select_everything_supported_in_bounds() {
        let geometries = GeoJsonProvider::parse(COLLECTION, &bounds(), &[]).unwrap();
        // The line string is unsupported and one point is out of bounds.
        assert_eq!(geometries.len(), 3);
    }

    #[test]
    fn positions_are_lon_lat() {
        let geometries =
            GeoJsonProvider::parse(COLLECTION, &bounds(), &["amenity".into()]).unwrap();
        let Geometry::Point(point) = geometries[0] else {
            panic!("expected a point");
        };
        assert_relative_eq!(point.latitude_deg(), 47.376, epsilon = 1e-9);
        assert_relative_eq!(point.longitude_deg(), 8.541, epsilon = 1e-9);
    }

    #[test]
    fn rejects_other_documents() {
        let result = GeoJsonProvider::parse(r#"{"type": "Feature"}"#, &bounds(), &[]);
        assert!(matches!(result, Err(FetchError::NotAFeatureCollection(kind)) if kind == "Feature"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let provider = GeoJsonProvider::new("does/not/exist.geojson");
        assert!(matches!(
            provider.fetch_landmarks(&bounds(), &[]),
            Err(FetchError::Io(_))
        ));
    }

    #[test]
    fn mission_bounds_are_centered() {
        let area = MissionArea::new(
            GeoPoint::from_degrees(47.3769, 8.5417),
            Length::new::<meter>(500.0),
        );
        let bounds = area.bounds();
        assert_relative_eq!(
            (bounds.min().latitude_deg() + bounds.max().latitude_deg()) / 2.0,
            47.3769,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            bounds.max().latitude_deg() - bounds.min().latitude_deg(),
            1000.0 / METERS_PER_DEGREE,
            epsilon = 1e-9
        );
        // Meridians converge so the same distance spans more longitude.
        assert!(
            bounds.max().longitude_deg() - bounds.min().longitude_deg()
                > bounds.max().latitude_deg() - bounds.min().latitude_deg()
        );
    }
}

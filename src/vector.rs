//! Vector layers: GeoJSON features projected into marker pixels.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec2;
use log::{info, warn};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::projector::CoordinateProjector;
use crate::util::parse_color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    pub fn from_type_name(name: &str) -> Option<GeometryKind> {
        Some(match name {
            "Point" => GeometryKind::Point,
            "MultiPoint" => GeometryKind::MultiPoint,
            "LineString" => GeometryKind::LineString,
            "MultiLineString" => GeometryKind::MultiLineString,
            "Polygon" => GeometryKind::Polygon,
            "MultiPolygon" => GeometryKind::MultiPolygon,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }

    /// Storage order is by descending priority, so points come last.
    pub fn priority(self) -> u8 {
        match self {
            GeometryKind::Point => 0,
            GeometryKind::MultiPoint => 1,
            GeometryKind::LineString => 2,
            GeometryKind::MultiLineString => 3,
            GeometryKind::Polygon => 4,
            GeometryKind::MultiPolygon => 5,
        }
    }
}

/// Geometry in marker pixels. Polygons are lists of rings, outer ring first.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(DVec2),
    MultiPoint(Vec<DVec2>),
    LineString(Vec<DVec2>),
    MultiLineString(Vec<Vec<DVec2>>),
    Polygon(Vec<Vec<DVec2>>),
    MultiPolygon(Vec<Vec<Vec<DVec2>>>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("feature has no geometry")]
    MissingGeometry,
    #[error("geometry has no type")]
    MissingType,
    #[error("unsupported geometry type `{0}`")]
    UnknownType(String),
    #[error("malformed coordinates for {0}")]
    BadCoordinates(&'static str),
    #[error("coordinate does not project to a finite pixel")]
    Unprojectable,
}

type GeometryResult<T> = std::result::Result<T, GeometryError>;

fn position(value: &Value, projector: &CoordinateProjector) -> Option<GeometryResult<DVec2>> {
    let coords = value.as_array()?;
    if coords.len() < 2 {
        return None;
    }
    let lat = coords[0].as_f64()?;
    let lon = coords[1].as_f64()?;
    Some(projector.to_pixels([lat, lon]).ok_or(GeometryError::Unprojectable))
}

fn positions(
    value: &Value,
    projector: &CoordinateProjector,
    kind: GeometryKind,
    min_len: usize,
) -> GeometryResult<Vec<DVec2>> {
    let bad = || GeometryError::BadCoordinates(kind.name());
    let list = value.as_array().ok_or_else(bad)?;
    if list.len() < min_len {
        return Err(bad());
    }
    list.iter()
        .map(|v| position(v, projector).unwrap_or_else(|| Err(bad())))
        .collect()
}

fn nested<T>(
    value: &Value,
    kind: GeometryKind,
    mut parse: impl FnMut(&Value) -> GeometryResult<T>,
) -> GeometryResult<Vec<T>> {
    let list = value
        .as_array()
        .filter(|l| !l.is_empty())
        .ok_or(GeometryError::BadCoordinates(kind.name()))?;
    list.iter().map(&mut parse).collect()
}

impl Geometry {
    /// Parses a GeoJSON geometry object whose positions are `[lat, lon]`.
    pub fn from_geojson(value: &Value, projector: &CoordinateProjector) -> GeometryResult<Geometry> {
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(GeometryError::MissingType)?;
        let kind = GeometryKind::from_type_name(type_name)
            .ok_or_else(|| GeometryError::UnknownType(type_name.to_string()))?;
        let coords = value
            .get("coordinates")
            .ok_or(GeometryError::BadCoordinates(kind.name()))?;

        let ring = |v: &Value| positions(v, projector, kind, 3);
        let line = |v: &Value| positions(v, projector, kind, 2);
        Ok(match kind {
            GeometryKind::Point => Geometry::Point(
                position(coords, projector)
                    .unwrap_or(Err(GeometryError::BadCoordinates(kind.name())))?,
            ),
            GeometryKind::MultiPoint => Geometry::MultiPoint(positions(coords, projector, kind, 1)?),
            GeometryKind::LineString => Geometry::LineString(line(coords)?),
            GeometryKind::MultiLineString => Geometry::MultiLineString(nested(coords, kind, line)?),
            GeometryKind::Polygon => Geometry::Polygon(nested(coords, kind, ring)?),
            GeometryKind::MultiPolygon => {
                Geometry::MultiPolygon(nested(coords, kind, |p| nested(p, kind, ring))?)
            }
        })
    }
}

/// The `properties` object of a feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(pub Map<String, Value>);

impl Properties {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Explicit display colour, when `fill` is present and parseable.
    pub fn fill(&self) -> Option<[u8; 3]> {
        self.str("fill").and_then(parse_color)
    }

    pub fn title(&self) -> Option<&str> {
        self.str("title")
    }

    pub fn description(&self) -> Option<&str> {
        self.str("description")
    }

    pub fn website(&self) -> Option<&str> {
        self.str("website")
    }

    pub fn video(&self) -> Option<&str> {
        self.str("video")
    }

    /// Photo paths; a single string counts as one photo.
    pub fn photos(&self) -> Vec<&str> {
        match self.0.get("photos") {
            Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }
}

static NEXT_FEATURE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique across all layers loaded by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(u64);

impl FeatureId {
    pub fn next() -> FeatureId {
        FeatureId(NEXT_FEATURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Properties) -> Feature {
        Feature {
            id: FeatureId::next(),
            geometry,
            properties,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.geometry.kind()
    }
}

/// Features of one layer, in drawing order.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    /// Sorts by descending kind priority; ties keep their order.
    pub fn new(mut features: Vec<Feature>) -> FeatureSet {
        features.sort_by_key(|f| Reverse(f.kind().priority()));
        FeatureSet { features }
    }

    /// Accepts a `FeatureCollection` or a bare array of features. Malformed
    /// features are skipped with a warning.
    pub fn from_geojson(value: &Value, projector: &CoordinateProjector) -> Result<FeatureSet> {
        let list = match value {
            Value::Array(list) => list,
            other => other
                .get("features")
                .and_then(Value::as_array)
                .ok_or(Error::NotAFeatureCollection)?,
        };

        let mut parsed = Vec::with_capacity(list.len());
        for (i, f) in list.iter().enumerate() {
            let geometry = match f.get("geometry").filter(|g| !g.is_null()) {
                Some(g) => Geometry::from_geojson(g, projector),
                None => Err(GeometryError::MissingGeometry),
            };
            match geometry {
                Ok(geometry) => {
                    let properties = match f.get("properties") {
                        Some(Value::Object(map)) => Properties(map.clone()),
                        _ => Properties::default(),
                    };
                    parsed.push((geometry, properties));
                }
                Err(e) => warn!("skipping feature {}: {}", i, e),
            }
        }

        // ids follow storage order
        parsed.sort_by_key(|(g, _)| Reverse(g.kind().priority()));
        let features = parsed
            .into_iter()
            .map(|(geometry, properties)| Feature::new(geometry, properties))
            .collect();
        let set = FeatureSet { features };
        info!("loaded {} of {} features", set.len(), list.len());
        Ok(set)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

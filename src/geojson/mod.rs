//! GeoJSON wire types
//!
//! Only the subset the map page renders: Point, LineString and Polygon
//! geometries inside Features and FeatureCollections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Open-ended property bag carried by every feature
pub type Properties = Map<String, JsonValue>;

/// Geometry of a single feature
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
}

impl Default for Geometry {
    /// Placeholder for records stored without a usable geometry
    fn default() -> Self {
        Self::Point {
            coordinates: vec![0.0, 0.0],
        }
    }
}

impl Geometry {
    /// GeoJSON type name, as stored in `geometry.type`
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::LineString { .. } => "LineString",
            Self::Polygon { .. } => "Polygon",
        }
    }

    /// Parse a loosely typed value, returning None for anything unsupported
    pub fn from_value(value: JsonValue) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// A GeoJSON Feature
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeoJsonFeature {
    #[serde(rename = "type", default)]
    pub tag: FeatureTag,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Properties,
}

impl GeoJsonFeature {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Self {
            tag: FeatureTag::Feature,
            geometry,
            properties,
        }
    }
}

/// A GeoJSON FeatureCollection
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub tag: CollectionTag,
    pub features: Vec<GeoJsonFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<GeoJsonFeature>) -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features,
        }
    }
}

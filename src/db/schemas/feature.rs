//! Feature document schema
//!
//! One spatial record per document. Every field is read leniently: a value
//! of the wrong BSON type decodes as if it were absent, so a single
//! malformed record degrades to defaults instead of failing a whole page.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::db::mongo::{IntoIndexes, Timestamped};
use crate::geojson::{GeoJsonFeature, Geometry, Properties};

/// Default collection name for features
pub const FEATURE_COLLECTION: &str = "features";

/// Grouping tag for features imported without one
pub const DEFAULT_FILE: &str = "default";

/// Feature document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FeatureDoc {
    /// MongoDB document ID. Ids that are not ObjectIds read as None.
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ObjectId>,

    #[serde(rename = "type", default = "feature_type", deserialize_with = "lenient_type")]
    pub kind: String,

    #[serde(default, deserialize_with = "lenient_geometry")]
    pub geometry: Option<Geometry>,

    #[serde(
        default,
        deserialize_with = "lenient_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub properties: Option<JsonValue>,

    /// Source file the feature was imported from
    #[serde(default = "default_file", deserialize_with = "lenient_file")]
    pub file: String,

    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime>,

    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn default_file() -> String {
    DEFAULT_FILE.to_string()
}

/// Decode any BSON value, keeping it only if it converts to `T`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Bson>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| bson::from_bson(value).ok()))
}

fn lenient_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient(deserializer)?.unwrap_or_else(feature_type))
}

fn lenient_file<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient(deserializer)?.unwrap_or_else(default_file))
}

/// Any BSON value as relaxed extended JSON
fn lenient_json<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Bson>::deserialize(deserializer)?;
    Ok(raw.map(Bson::into_relaxed_extjson))
}

fn lenient_geometry<'de, D>(deserializer: D) -> Result<Option<Geometry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_json(deserializer)?.and_then(Geometry::from_value))
}

impl FeatureDoc {
    /// Build a new document from a parsed GeoJSON feature
    pub fn from_feature(feature: GeoJsonFeature, file: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: feature_type(),
            geometry: Some(feature.geometry),
            properties: Some(JsonValue::Object(feature.properties)),
            file: file.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Map to the wire representation, substituting defaults for missing parts
    pub fn into_geojson(self) -> GeoJsonFeature {
        let properties = match self.properties {
            Some(JsonValue::Object(map)) => map,
            _ => Properties::new(),
        };

        GeoJsonFeature::new(self.geometry.unwrap_or_default(), properties)
    }
}

impl IntoIndexes for FeatureDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Filter by source file
            (doc! { "file": 1 }, None),
            // Filter by geometry kind
            (doc! { "geometry.type": 1 }, None),
            // Recency queries
            (doc! { "createdAt": -1 }, None),
        ]
    }
}

impl Timestamped for FeatureDoc {
    fn stamp(&mut self, now: DateTime) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_document() {
        let raw = doc! {
            "_id": ObjectId::new(),
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [10.5, 20] },
            "properties": { "name": "Well", "depth": 12 },
            "file": "wells.geojson",
        };

        let feature: FeatureDoc = bson::from_document(raw).unwrap();
        assert_eq!(feature.file, "wells.geojson");
        assert_eq!(
            feature.geometry,
            Some(Geometry::Point {
                coordinates: vec![10.5, 20.0]
            })
        );

        let wire = feature.into_geojson();
        assert_eq!(wire.properties.get("name"), Some(&json!("Well")));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let feature: FeatureDoc = bson::from_document(doc! { "_id": ObjectId::new() }).unwrap();
        assert_eq!(feature.kind, "Feature");
        assert_eq!(feature.file, DEFAULT_FILE);

        let wire = feature.into_geojson();
        assert_eq!(wire.geometry, Geometry::default());
        assert!(wire.properties.is_empty());
    }

    #[test]
    fn test_unsupported_geometry_becomes_placeholder() {
        let raw = doc! {
            "geometry": { "type": "GeometryCollection", "geometries": [] },
            "properties": "not a map",
        };

        let wire = bson::from_document::<FeatureDoc>(raw).unwrap().into_geojson();
        assert_eq!(wire.geometry, Geometry::default());
        assert!(wire.properties.is_empty());
    }

    #[test]
    fn test_wrongly_typed_fields_fall_back_to_defaults() {
        let raw = doc! {
            "_id": "abc",
            "type": 7,
            "geometry": { "type": "Point", "coordinates": [1, 2] },
            "properties": { "name": "Gate" },
            "file": null,
            "createdAt": "2024-01-01",
            "updatedAt": 12,
        };

        let feature: FeatureDoc = bson::from_document(raw).unwrap();
        assert_eq!(feature.id, None);
        assert_eq!(feature.kind, "Feature");
        assert_eq!(feature.file, DEFAULT_FILE);
        assert_eq!(feature.created_at, None);
        assert_eq!(feature.updated_at, None);

        let wire = feature.into_geojson();
        assert_eq!(
            wire.geometry,
            Geometry::Point {
                coordinates: vec![1.0, 2.0]
            }
        );
        assert_eq!(wire.properties.get("name"), Some(&json!("Gate")));
    }

    #[test]
    fn test_well_typed_id_and_timestamps_survive() {
        let id = ObjectId::new();
        let created = DateTime::from_millis(1_700_000_000_000);
        let raw = doc! { "_id": id, "createdAt": created, "file": "roads" };

        let feature: FeatureDoc = bson::from_document(raw).unwrap();
        assert_eq!(feature.id, Some(id));
        assert_eq!(feature.created_at, Some(created));
        assert_eq!(feature.file, "roads");
    }

    #[test]
    fn test_stamp_preserves_creation_time() {
        let created = DateTime::from_millis(1_000);
        let mut feature = FeatureDoc {
            created_at: Some(created),
            ..Default::default()
        };

        feature.stamp(DateTime::from_millis(5_000));
        assert_eq!(feature.created_at, Some(created));
        assert_eq!(feature.updated_at, Some(DateTime::from_millis(5_000)));
    }

    #[test]
    fn test_indexes_cover_file_geometry_and_creation() {
        let keys: Vec<String> = FeatureDoc::into_indices()
            .into_iter()
            .flat_map(|(keys, _)| keys.keys().cloned().collect::<Vec<_>>())
            .collect();
        assert!(keys.contains(&"file".to_string()));
        assert!(keys.contains(&"geometry.type".to_string()));
        assert!(keys.contains(&"createdAt".to_string()));
    }
}

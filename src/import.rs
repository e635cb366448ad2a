//! GeoJSON file import
//!
//! Loads a FeatureCollection (or a single Feature) from disk into the
//! feature collection, tagging every record with a `file` grouping tag.
//! Features whose geometry is not a Point, LineString or Polygon are skipped.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::db::schemas::DEFAULT_FILE;
use crate::db::FeatureDoc;
use crate::geojson::{GeoJsonFeature, Geometry, Properties};
use crate::store::MongoFeatureStore;
use crate::types::{MapError, Result};

/// Outcome of parsing an import file
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub features: Vec<FeatureDoc>,
    /// Features dropped for missing or unsupported geometry
    pub skipped: usize,
}

/// Grouping tag derived from a file path: its file name, or "default"
pub fn file_tag_for(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILE)
        .to_string()
}

/// Parse GeoJSON bytes into feature documents
pub fn parse_geojson(bytes: &[u8], file_tag: &str) -> Result<ParsedImport> {
    let root: JsonValue = serde_json::from_slice(bytes)?;

    let raw_features = match root.get("type").and_then(JsonValue::as_str) {
        Some("FeatureCollection") => match root.get("features") {
            Some(JsonValue::Array(features)) => features.clone(),
            _ => {
                return Err(MapError::InvalidGeoJson(
                    "FeatureCollection without a features array".into(),
                ))
            }
        },
        Some("Feature") => vec![root],
        Some(other) => {
            return Err(MapError::InvalidGeoJson(format!(
                "expected FeatureCollection or Feature, got {}",
                other
            )))
        }
        None => return Err(MapError::InvalidGeoJson("missing top-level type".into())),
    };

    let mut parsed = ParsedImport::default();

    for (index, mut raw) in raw_features.into_iter().enumerate() {
        let geometry = raw
            .get_mut("geometry")
            .map(JsonValue::take)
            .and_then(Geometry::from_value);

        let Some(geometry) = geometry else {
            warn!(index, "Skipping feature with missing or unsupported geometry");
            parsed.skipped += 1;
            continue;
        };

        let properties = match raw.get_mut("properties").map(JsonValue::take) {
            Some(JsonValue::Object(map)) => map,
            _ => Properties::new(),
        };

        parsed.features.push(FeatureDoc::from_feature(
            GeoJsonFeature::new(geometry, properties),
            file_tag,
        ));
    }

    Ok(parsed)
}

/// Read a GeoJSON file and insert its features. Returns the number inserted.
pub async fn import_file(
    store: &MongoFeatureStore,
    path: &Path,
    file_tag: Option<&str>,
) -> Result<usize> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => MapError::NotFound(path.display().to_string()),
        _ => MapError::from(e),
    })?;

    let tag = file_tag
        .map(str::to_string)
        .unwrap_or_else(|| file_tag_for(path));

    let parsed = parse_geojson(&bytes, &tag)?;
    let total = parsed.features.len();
    let inserted = store.insert_many(parsed.features).await?;

    info!(
        path = %path.display(),
        file = %tag,
        parsed = total,
        inserted,
        skipped = parsed.skipped,
        "Import complete"
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_feature_collection() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                    "properties": { "name": "A" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] },
                    "properties": null
                }
            ]
        });

        let parsed = parse_geojson(body.to_string().as_bytes(), "parks.geojson").unwrap();
        assert_eq!(parsed.features.len(), 2);
        assert_eq!(parsed.skipped, 0);
        assert!(parsed.features.iter().all(|f| f.file == "parks.geojson"));

        let second = parsed.features[1].clone().into_geojson();
        assert_eq!(second.geometry.type_name(), "Polygon");
        assert!(second.properties.is_empty());
    }

    #[test]
    fn test_parse_skips_unsupported_geometry() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "MultiPoint", "coordinates": [[0, 0]] } },
                { "type": "Feature", "geometry": null },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [5, 5] } }
            ]
        });

        let parsed = parse_geojson(body.to_string().as_bytes(), "mixed").unwrap();
        assert_eq!(parsed.features.len(), 1);
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn test_parse_single_feature() {
        let body = json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [3, 4]] },
            "properties": { "route": 66 }
        });

        let parsed = parse_geojson(body.to_string().as_bytes(), DEFAULT_FILE).unwrap();
        assert_eq!(parsed.features.len(), 1);
    }

    #[test]
    fn test_parse_rejects_other_documents() {
        assert!(matches!(
            parse_geojson(br#"{"type":"Topology"}"#, "x"),
            Err(MapError::InvalidGeoJson(_))
        ));
        assert!(matches!(
            parse_geojson(br#"{"type":"FeatureCollection"}"#, "x"),
            Err(MapError::InvalidGeoJson(_))
        ));
        assert!(matches!(
            parse_geojson(b"not json", "x"),
            Err(MapError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_file_tag_for_path() {
        assert_eq!(file_tag_for(Path::new("/data/trails.geojson")), "trails.geojson");
        assert_eq!(file_tag_for(Path::new("/")), DEFAULT_FILE);
    }
}

//! Upload bytes to point features

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use geojson::GeoJson;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{kml, LoadedGeometry, ParseMethod, PointFeature, DEFAULT_CRS};
use crate::error::GeometryError;
use crate::validation::UploadedFile;

/// Converts accepted uploads into normalized point features
#[derive(Debug, Clone)]
pub struct GeometryLoader {
    temp_dir: PathBuf,
}

impl GeometryLoader {
    /// Creates a loader writing scratch files into `temp_dir`
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Loads point features from an upload
    ///
    /// The bytes are staged in a scratch file that is removed when this
    /// function returns, whichever way it returns.
    pub fn load(&self, file: &UploadedFile) -> Result<LoadedGeometry, GeometryError> {
        let extension = file.extension().unwrap_or_default();
        let scratch = self.stage(&extension, &file.bytes)?;

        let (features, crs, method) = if extension == ".kml" {
            let text = std::fs::read_to_string(scratch.path())
                .map_err(|e| GeometryError::Parse(format!("KML is not valid UTF-8 text: {}", e)))?;
            (kml::parse_points(&text)?, None, ParseMethod::Kml)
        } else {
            match parse_structured(scratch.path()) {
                Ok((features, crs)) => (features, crs, ParseMethod::Structured),
                Err(primary) => {
                    warn!(file = %file.name, error = %primary, "Structured GeoJSON parse failed, falling back to manual parse");
                    let (features, crs) = parse_manual(scratch.path()).map_err(|manual| {
                        GeometryError::Parse(format!("{}; manual parse: {}", primary, manual))
                    })?;
                    (features, crs, ParseMethod::Manual)
                }
            }
        };

        if features.is_empty() {
            return Err(GeometryError::Empty);
        }

        for feature in &features {
            if !(-180.0..=180.0).contains(&feature.lon()) || !(-90.0..=90.0).contains(&feature.lat()) {
                return Err(GeometryError::InvalidCoordinate {
                    lon: feature.lon(),
                    lat: feature.lat(),
                });
            }
        }

        let crs = normalize_crs(crs.as_deref())?;

        info!(
            file = %file.name,
            features = features.len(),
            method = ?method,
            crs = %crs,
            "Loaded point features"
        );

        Ok(LoadedGeometry {
            features,
            crs,
            method,
        })
    }

    /// Writes bytes to a scratch file confined to the temp directory
    fn stage(&self, extension: &str, bytes: &[u8]) -> Result<NamedTempFile, GeometryError> {
        let suffix: String = extension
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect();

        let mut scratch = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|e| GeometryError::Storage(e.to_string()))?;

        let root = self
            .temp_dir
            .canonicalize()
            .map_err(|e| GeometryError::Storage(e.to_string()))?;
        let resolved = scratch
            .path()
            .canonicalize()
            .map_err(|e| GeometryError::Storage(e.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(GeometryError::Storage(format!(
                "scratch file {} escapes {}",
                resolved.display(),
                root.display()
            )));
        }

        scratch
            .write_all(bytes)
            .and_then(|_| scratch.flush())
            .map_err(|e| GeometryError::Storage(e.to_string()))?;

        debug!(path = %resolved.display(), bytes = bytes.len(), "Staged upload");
        Ok(scratch)
    }
}

/// Reads the document with the `geojson` crate
fn parse_structured(path: &Path) -> Result<(Vec<PointFeature>, Option<String>), GeometryError> {
    let text = std::fs::read_to_string(path).map_err(|e| GeometryError::Parse(e.to_string()))?;
    let document: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| GeometryError::Parse(e.to_string()))?;

    let (features, crs) = match document {
        GeoJson::FeatureCollection(collection) => {
            let crs = declared_crs(collection.foreign_members.as_ref());
            (collection.features, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = declared_crs(feature.foreign_members.as_ref());
            (vec![feature], crs)
        }
        GeoJson::Geometry(geometry) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    let mut points = Vec::new();
    for feature in features {
        let Some(geometry) = feature.geometry else {
            debug!("Skipping feature without geometry");
            continue;
        };
        match geometry.value {
            geojson::Value::Point(position) if position.len() >= 2 => {
                points.push(PointFeature::new(
                    position[0],
                    position[1],
                    feature.properties.unwrap_or_default(),
                ));
            }
            other => debug!(geometry = geometry_kind(&other), "Skipping non-point feature"),
        }
    }

    Ok((points, crs))
}

fn geometry_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Walks `features[]` of the raw JSON, keeping well-formed points only
fn parse_manual(path: &Path) -> Result<(Vec<PointFeature>, Option<String>), GeometryError> {
    let file = File::open(path).map_err(|e| GeometryError::Storage(e.to_string()))?;
    let document: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| GeometryError::Parse(e.to_string()))?;

    let crs = document.as_object().and_then(|obj| declared_crs(Some(obj)));
    let features = document
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let points = features
        .iter()
        .filter_map(|feature| {
            let geometry = feature.get("geometry")?;
            if geometry.get("type")?.as_str()? != "Point" {
                return None;
            }
            let coords = geometry.get("coordinates")?.as_array()?;
            if coords.len() < 2 {
                return None;
            }
            let lon = coords[0].as_f64()?;
            let lat = coords[1].as_f64()?;
            let properties = feature
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some(PointFeature::new(lon, lat, properties))
        })
        .collect();

    Ok((points, crs))
}

/// Legacy `crs` member: `{"type": "name", "properties": {"name": ...}}`
fn declared_crs(members: Option<&Map<String, Value>>) -> Option<String> {
    members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Maps WGS84 spellings to [`DEFAULT_CRS`]; anything else is rejected
pub fn normalize_crs(declared: Option<&str>) -> Result<String, GeometryError> {
    let Some(name) = declared else {
        return Ok(DEFAULT_CRS.to_string());
    };

    let lower = name.trim().to_ascii_lowercase();
    let is_wgs84 = lower == "wgs84"
        || lower.ends_with("crs84")
        || lower.ends_with(":4326")
        || lower.ends_with("/4326");

    if is_wgs84 {
        Ok(DEFAULT_CRS.to_string())
    } else {
        Err(GeometryError::UnsupportedCrs(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_POINT: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"id": 7},
             "geometry": {"type": "Point", "coordinates": [-47.9292, -15.7801]}}
        ]
    }"#;

    fn loader(dir: &tempfile::TempDir) -> GeometryLoader {
        GeometryLoader::new(dir.path())
    }

    fn scratch_count(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_load_structured() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::new("poi.geojson", ONE_POINT);

        let loaded = loader(&dir).load(&file).unwrap();
        assert_eq!(loaded.feature_count(), 1);
        assert_eq!(loaded.method, ParseMethod::Structured);
        assert_eq!(loaded.crs, DEFAULT_CRS);
        assert_eq!(loaded.features[0].lon(), -47.9292);
        assert_eq!(loaded.features[0].properties["id"], 7);
        assert_eq!(scratch_count(&dir), 0);
    }

    #[test]
    fn test_manual_fallback() {
        // No top-level "type", which the structured reader refuses
        let body = r#"{"features": [
            {"geometry": {"type": "Point", "coordinates": [10.5, 20.25]}, "properties": {"name": "a"}},
            {"geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"geometry": {"type": "Point", "coordinates": [1]}}
        ]}"#;
        let dir = tempfile::tempdir().unwrap();
        let loaded = loader(&dir)
            .load(&UploadedFile::new("poi.geojson", body))
            .unwrap();

        assert_eq!(loaded.method, ParseMethod::Manual);
        assert_eq!(loaded.feature_count(), 1);
        assert_eq!(loaded.features[0].lat(), 20.25);
        assert_eq!(loaded.features[0].properties["name"], "a");
        assert_eq!(scratch_count(&dir), 0);
    }

    #[test]
    fn test_non_point_features_only_is_empty() {
        let body = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
        ]}"#;
        let dir = tempfile::tempdir().unwrap();
        let result = loader(&dir).load(&UploadedFile::new("poi.geojson", body));
        assert!(matches!(result, Err(GeometryError::Empty)));
        assert_eq!(scratch_count(&dir), 0);
    }

    #[test]
    fn test_garbage_fails_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let result = loader(&dir).load(&UploadedFile::new("poi.geojson", "not json at all"));
        assert!(matches!(result, Err(GeometryError::Parse(_))));
        assert_eq!(scratch_count(&dir), 0);
    }

    #[test]
    fn test_multiple_points_kept() {
        let body = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 1]}},
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [2, 2]}}
        ]}"#;
        let dir = tempfile::tempdir().unwrap();
        let loaded = loader(&dir)
            .load(&UploadedFile::new("poi.geojson", body))
            .unwrap();
        assert_eq!(loaded.feature_count(), 2);
    }

    #[test]
    fn test_declared_crs() {
        let body = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Point", "coordinates": [1, 1]}}]}"#;
        let dir = tempfile::tempdir().unwrap();
        let loaded = loader(&dir)
            .load(&UploadedFile::new("poi.geojson", body))
            .unwrap();
        assert_eq!(loaded.crs, DEFAULT_CRS);
    }

    #[test]
    fn test_projected_crs_rejected() {
        let body = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:31983"}},
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Point", "coordinates": [1, 1]}}]}"#;
        let dir = tempfile::tempdir().unwrap();
        let result = loader(&dir).load(&UploadedFile::new("poi.geojson", body));
        assert!(matches!(result, Err(GeometryError::UnsupportedCrs(_))));
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let body = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "Point", "coordinates": [200.0, 10.0]}}"#;
        let dir = tempfile::tempdir().unwrap();
        let result = loader(&dir).load(&UploadedFile::new("poi.geojson", body));
        assert!(matches!(
            result,
            Err(GeometryError::InvalidCoordinate { lon, .. }) if lon == 200.0
        ));
    }

    #[test]
    fn test_load_kml() {
        let body = "<kml><Placemark><name>p</name><Point><coordinates>-47.1,-15.2</coordinates></Point></Placemark></kml>";
        let dir = tempfile::tempdir().unwrap();
        let loaded = loader(&dir)
            .load(&UploadedFile::new("poi.kml", body))
            .unwrap();
        assert_eq!(loaded.method, ParseMethod::Kml);
        assert_eq!(loaded.feature_count(), 1);
    }

    #[test]
    fn test_missing_temp_dir_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = GeometryLoader::new(missing).load(&UploadedFile::new("poi.geojson", ONE_POINT));
        assert!(matches!(result, Err(GeometryError::Storage(_))));
    }

    #[test]
    fn test_normalize_crs() {
        assert_eq!(normalize_crs(None).unwrap(), "EPSG:4326");
        assert_eq!(normalize_crs(Some("EPSG:4326")).unwrap(), "EPSG:4326");
        assert_eq!(
            normalize_crs(Some("http://www.opengis.net/def/crs/EPSG/0/4326")).unwrap(),
            "EPSG:4326"
        );
        assert!(normalize_crs(Some("EPSG:3857")).is_err());
    }
}

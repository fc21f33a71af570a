//! Point-of-interest loading and region buffering

pub mod kml;
pub mod loader;
pub mod region;

use geo::Point;
use serde::Serialize;
use serde_json::{Map, Value};

pub use loader::GeometryLoader;
pub use region::{AnalysisRegion, RegionResolver};

/// CRS assigned when a document declares none
pub const DEFAULT_CRS: &str = "EPSG:4326";

/// A single point feature with its properties
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub point: Point<f64>,
    pub properties: Map<String, Value>,
}

impl PointFeature {
    pub fn new(lon: f64, lat: f64, properties: Map<String, Value>) -> Self {
        Self {
            point: Point::new(lon, lat),
            properties,
        }
    }

    pub fn lon(&self) -> f64 {
        self.point.x()
    }

    pub fn lat(&self) -> f64 {
        self.point.y()
    }
}

/// How the upload was turned into features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Structured GeoJSON reader
    Structured,
    /// Raw JSON walk after the structured reader failed
    Manual,
    /// KML placemarks
    Kml,
}

/// Normalized point features from one upload
#[derive(Debug, Clone)]
pub struct LoadedGeometry {
    pub features: Vec<PointFeature>,
    pub crs: String,
    pub method: ParseMethod,
}

impl LoadedGeometry {
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

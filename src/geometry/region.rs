//! Point buffering into an analysis region

use geo::{BoundingRect, Coord, GeodesicArea, HaversineDestination, LineString, Point, Polygon, Rect};
use serde::Serialize;
use tracing::info;

use super::LoadedGeometry;
use crate::config::RegionConfig;
use crate::error::RegionError;

/// The buffered polygon around the point of interest
#[derive(Debug, Clone)]
pub struct AnalysisRegion {
    center: Point<f64>,
    radius_m: f64,
    polygon: Polygon<f64>,
    area_m2: f64,
}

impl AnalysisRegion {
    pub fn center(&self) -> Point<f64> {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Geodesic area in square meters
    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    /// Geodesic area in hectares
    pub fn area_ha(&self) -> f64 {
        self.area_m2 / 10_000.0
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygon.bounding_rect()
    }

    /// GeoJSON geometry of the buffered polygon
    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.polygon))
    }

    /// Serializable summary of the region
    pub fn summary(&self) -> RegionSummary {
        let bbox = self
            .bounding_rect()
            .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y]);
        RegionSummary {
            longitude: self.center.x(),
            latitude: self.center.y(),
            radius_m: self.radius_m,
            area_ha: self.area_ha(),
            bbox,
        }
    }
}

/// Region description returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub longitude: f64,
    pub latitude: f64,
    pub radius_m: f64,
    pub area_ha: f64,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: Option<[f64; 4]>,
}

/// Turns exactly one point into a buffered region
#[derive(Debug, Clone)]
pub struct RegionResolver {
    min_radius_m: f64,
    max_radius_m: f64,
    segments: usize,
}

impl RegionResolver {
    pub fn new(min_radius_m: f64, max_radius_m: f64, segments: usize) -> Self {
        Self {
            min_radius_m,
            max_radius_m,
            segments: segments.max(3),
        }
    }

    pub fn from_config(config: &RegionConfig) -> Self {
        Self::new(
            config.min_radius_m,
            config.max_radius_m,
            config.buffer_segments,
        )
    }

    /// Buffers the single point of `geometry` by `radius_m`
    ///
    /// Several points are an error, never a choice: the caller must pick one.
    pub fn resolve(
        &self,
        geometry: &LoadedGeometry,
        radius_m: f64,
    ) -> Result<AnalysisRegion, RegionError> {
        if !(radius_m >= self.min_radius_m && radius_m <= self.max_radius_m) {
            return Err(RegionError::RadiusOutOfRange {
                radius: radius_m,
                min: self.min_radius_m,
                max: self.max_radius_m,
            });
        }

        let center = match geometry.features.as_slice() {
            [] => return Err(RegionError::NoPoint),
            [feature] => feature.point,
            many => return Err(RegionError::MultiplePoints(many.len())),
        };

        let polygon = self.buffer(center, radius_m);
        let area_m2 = polygon.geodesic_area_unsigned();
        if radius_m <= 0.0 || !area_m2.is_finite() || area_m2 <= 0.0 {
            return Err(RegionError::DegenerateGeometry);
        }

        info!(
            lon = center.x(),
            lat = center.y(),
            radius_m,
            area_ha = area_m2 / 10_000.0,
            "Resolved analysis region"
        );

        Ok(AnalysisRegion {
            center,
            radius_m,
            polygon,
            area_m2,
        })
    }

    /// Counter-clockwise ring of haversine destinations at evenly spaced bearings
    fn buffer(&self, center: Point<f64>, radius_m: f64) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = (0..self.segments)
            .map(|i| {
                let bearing = 360.0 - 360.0 * i as f64 / self.segments as f64;
                center.haversine_destination(bearing, radius_m).into()
            })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }
}

//! Upload to labelled metrics table
//!
//! Geometry and region problems stop a request; data problems only lower
//! the fidelity of the grid the metrics are computed on.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::acquire::{Acquirer, TierFailure};
use crate::catalog::{DatasetSelection, Session};
use crate::config::PipelineConfig;
use crate::error::{Result, ValidationError};
use crate::geometry::region::RegionSummary;
use crate::geometry::{GeometryLoader, ParseMethod, RegionResolver};
use crate::legend::Legend;
use crate::metrics::{compute_table, ClassMetricsTable, MetricsEngine};
use crate::types::{Dimensions, GridSource};
use crate::validation::{validate_upload, UploadedFile};

/// Everything the presentation layer needs about one analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file_name: String,
    pub parse_method: ParseMethod,
    pub region: RegionSummary,
    /// Buffered region as a GeoJSON polygon
    pub region_geometry: geojson::Geometry,
    pub source: GridSource,
    /// Set when the grid is placeholder data
    pub synthetic: bool,
    pub selection: Option<DatasetSelection>,
    pub padded: bool,
    pub failures: Vec<TierFailure>,
    pub grid: Dimensions,
    pub classes: ClassMetricsTable,
    /// Classes above the dominance threshold, largest first
    pub dominant: ClassMetricsTable,
    pub notices: Vec<String>,
}

/// Wires validation, geometry, acquisition and metrics together
pub struct Pipeline {
    config: PipelineConfig,
    loader: GeometryLoader,
    resolver: RegionResolver,
    acquirer: Acquirer,
    session: Arc<Session>,
    engine: Arc<dyn MetricsEngine>,
    legend: Legend,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        session: Arc<Session>,
        engine: Arc<dyn MetricsEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let legend = Legend::from_override(config.legend.as_deref());
        Ok(Self {
            loader: GeometryLoader::new(config.temp_dir()),
            resolver: RegionResolver::from_config(&config.region),
            acquirer: Acquirer::new(config.acquisition.clone()),
            session,
            engine,
            legend,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Analyzes an upload around its single point
    ///
    /// `radius_m` defaults to the configured default radius.
    pub fn run(&self, file: Option<&UploadedFile>, radius_m: Option<f64>) -> Result<AnalysisReport> {
        let radius_m = radius_m.unwrap_or(self.config.region.default_radius_m);
        let file_name = file.map(|f| f.name.clone()).unwrap_or_default();
        let span = info_span!("analyze", file = %file_name, radius_m);
        let _guard = span.enter();

        validate_upload(file, &self.config.upload)?;
        let Some(file) = file else {
            return Err(ValidationError::Missing.into());
        };

        let geometry = self.loader.load(file)?;
        let region = self.resolver.resolve(&geometry, radius_m)?;

        let acquisition = self.acquirer.acquire(&self.session, &region)?;
        let grid = &acquisition.grid;

        let classes = compute_table(
            self.engine.as_ref(),
            grid,
            self.config.min_grid_dim,
            &self.legend,
        )?;
        let dominant = classes.dominant(self.config.dominant_min_proportion);

        let mut notices = Vec::new();
        match acquisition.source {
            GridSource::Direct => {}
            GridSource::Aggregated => notices.push(
                "Rectangular sample unavailable; metrics use an aggregated sample reshaped into a square grid"
                    .to_string(),
            ),
            GridSource::Synthetic => {
                warn!("Reporting metrics computed on placeholder data");
                notices.push(
                    "No classification data could be retrieved; metrics use a demonstration grid and do not describe this region"
                        .to_string(),
                );
            }
        }
        if acquisition.padded {
            notices.push(format!(
                "Fewer than {} valid pixels were found; the sample was padded with typical classes",
                self.config.acquisition.min_valid_pixels
            ));
        }

        info!(
            source = acquisition.source.name(),
            classes = classes.len(),
            dominant = dominant.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            file_name,
            parse_method: geometry.method,
            region: region.summary(),
            region_geometry: region.to_geojson(),
            source: acquisition.source,
            synthetic: acquisition.is_synthetic(),
            padded: acquisition.padded,
            grid: grid.dims(),
            failures: acquisition.failures,
            selection: acquisition.selection,
            classes,
            dominant,
            notices,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by pipeline and API tests

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::catalog::{BandArrays, RasterService, RectangleRequest, ReduceRequest, Session};
    use crate::error::{AcquisitionError, MetricsError};
    use crate::metrics::{ClassMetrics, MetricsEngine, METRIC_COUNT};
    use crate::types::ClassGrid;

    /// Service answering every dataset with one band and a fixed rectangle
    #[derive(Default)]
    pub struct FakeRaster {
        pub rectangle: Option<Vec<Vec<i64>>>,
        pub list_calls: AtomicUsize,
    }

    impl FakeRaster {
        pub fn with_rectangle(rows: Vec<Vec<i64>>) -> Self {
            Self {
                rectangle: Some(rows),
                ..Default::default()
            }
        }
    }

    impl RasterService for FakeRaster {
        fn list_bands(&self, _: &str) -> Result<Vec<String>, AcquisitionError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            match self.rectangle {
                Some(_) => Ok(vec!["classification_2021".to_string()]),
                None => Err(AcquisitionError::Request("asset not found".into())),
            }
        }

        fn sample_rectangle(&self, request: &RectangleRequest<'_>) -> Result<BandArrays, AcquisitionError> {
            let rows = self
                .rectangle
                .clone()
                .ok_or_else(|| AcquisitionError::Request("asset not found".into()))?;
            let mut arrays = HashMap::new();
            arrays.insert(request.band.to_string(), rows);
            Ok(arrays)
        }

        fn reduce_region(&self, _: &ReduceRequest<'_>) -> Result<Vec<Option<i64>>, AcquisitionError> {
            Err(AcquisitionError::Request("asset not found".into()))
        }
    }

    /// Counts cells per class; proportion is the share of cells
    #[derive(Default)]
    pub struct CountingEngine {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl MetricsEngine for CountingEngine {
        fn compute_class_metrics(&self, grid: &ClassGrid) -> Result<Vec<ClassMetrics>, MetricsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetricsError::InvalidGrid("engine rejected grid".into()));
            }
            let cell_ha = grid.resolution_m() * grid.resolution_m() / 10_000.0;
            let total = grid.cells().len() as f64;
            Ok(grid
                .distinct_classes()
                .into_iter()
                .map(|class| {
                    let count = grid.cells().iter().filter(|&&c| c == class).count() as f64;
                    let mut values = [1.0; METRIC_COUNT];
                    values[0] = count * cell_ha;
                    values[1] = 100.0 * count / total;
                    ClassMetrics::from_values(class, values)
                })
                .collect())
        }
    }

    pub fn connected(raster: FakeRaster) -> (Arc<FakeRaster>, Arc<Session>) {
        let raster = Arc::new(raster);
        let service: Arc<dyn RasterService> = raster.clone();
        (raster, Arc::new(Session::connected(service)))
    }

    pub fn point_geojson(points: &[(f64, f64)]) -> Vec<u8> {
        let features: Vec<serde_json::Value> = points
            .iter()
            .map(|(lon, lat)| {
                serde_json::json!({
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [lon, lat]}
                })
            })
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "type": "FeatureCollection",
            "features": features
        }))
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::{Error, RegionError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(dir: &tempfile::TempDir) -> PipelineConfig {
        PipelineConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    fn upload(points: &[(f64, f64)]) -> UploadedFile {
        UploadedFile::new("site.geojson", point_geojson(points))
    }

    #[test]
    fn test_direct_run_reports_dominant_classes() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = connected(FakeRaster::with_rectangle(vec![
            vec![3, 3, 3, 3],
            vec![3, 3, 15, 15],
            vec![3, 3, 15, 15],
            vec![3, 3, 3, 33],
        ]));
        let engine = Arc::new(CountingEngine::default());
        let pipeline = Pipeline::new(config(&dir), session, engine.clone()).unwrap();

        let report = pipeline
            .run(Some(&upload(&[(-47.93, -15.78)])), Some(3000.0))
            .unwrap();

        assert_eq!(report.source, GridSource::Direct);
        assert!(!report.synthetic);
        assert!(report.notices.is_empty());
        assert_eq!(report.grid, Dimensions::new(4, 4));
        assert_eq!(report.region.radius_m, 3000.0);
        assert_eq!(report.classes.len(), 3);
        // 33 covers 1/16 of the grid and is filtered out
        let dominant: Vec<i32> = report.dominant.rows.iter().map(|r| r.metrics.class_code).collect();
        assert_eq!(dominant, vec![3, 15]);
        assert_eq!(report.dominant.rows[0].label, "Forest Formation");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_multiple_points_stop_before_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = connects.clone();
        let session = Arc::new(Session::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(crate::error::AcquisitionError::Unavailable("offline".into()))
        }));
        let engine = Arc::new(CountingEngine::default());
        let pipeline = Pipeline::new(config(&dir), session.clone(), engine.clone()).unwrap();

        let err = pipeline
            .run(Some(&upload(&[(-47.93, -15.78), (-47.90, -15.80)])), Some(5000.0))
            .unwrap_err();

        assert!(matches!(err, Error::Region(RegionError::MultiplePoints(2))));
        assert!(err.is_user_error());
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert_eq!(session.connect_attempts(), 0);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unavailable_datasets_yield_synthetic_report() {
        let dir = tempfile::tempdir().unwrap();
        let (raster, session) = connected(FakeRaster::default());
        let pipeline =
            Pipeline::new(config(&dir), session, Arc::new(CountingEngine::default())).unwrap();

        let report = pipeline
            .run(Some(&upload(&[(-47.93, -15.78)])), Some(5000.0))
            .unwrap();

        assert_eq!(report.source, GridSource::Synthetic);
        assert!(report.synthetic);
        assert!(report.selection.is_none());
        assert_eq!(report.notices.len(), 1);
        assert_eq!(raster.list_calls.load(Ordering::SeqCst), 4);
        assert!(!report.classes.is_empty());
    }

    #[test]
    fn test_missing_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = connected(FakeRaster::default());
        let pipeline =
            Pipeline::new(config(&dir), session, Arc::new(CountingEngine::default())).unwrap();

        let err = pipeline.run(None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Missing)));
    }

    #[test]
    fn test_default_radius_applies() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = connected(FakeRaster::with_rectangle(vec![vec![3, 15]; 2]));
        let pipeline =
            Pipeline::new(config(&dir), session, Arc::new(CountingEngine::default())).unwrap();

        let report = pipeline.run(Some(&upload(&[(-47.93, -15.78)])), None).unwrap();
        assert_eq!(report.region.radius_m, 2500.0);
    }

    #[test]
    fn test_radius_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = connected(FakeRaster::default());
        let pipeline =
            Pipeline::new(config(&dir), session, Arc::new(CountingEngine::default())).unwrap();

        let err = pipeline
            .run(Some(&upload(&[(-47.93, -15.78)])), Some(50_000.0))
            .unwrap_err();
        assert!(matches!(err, Error::Region(RegionError::RadiusOutOfRange { .. })));
    }

    #[test]
    fn test_engine_failure_is_not_a_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = connected(FakeRaster::with_rectangle(vec![vec![3, 15, 15]; 3]));
        let engine = Arc::new(CountingEngine {
            fail: true,
            ..Default::default()
        });
        let pipeline = Pipeline::new(config(&dir), session, engine).unwrap();

        let err = pipeline
            .run(Some(&upload(&[(-47.93, -15.78)])), Some(5000.0))
            .unwrap_err();
        assert_eq!(err.kind(), "metrics");
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (_, session) = connected(FakeRaster::default());
        let mut config = PipelineConfig::default();
        config.min_grid_dim = 0;
        assert!(Pipeline::new(config, session, Arc::new(CountingEngine::default())).is_err());
    }
}

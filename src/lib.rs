//! landmetrics - land-cover landscape metrics around a point of interest
//!
//! An uploaded GeoJSON (or KML) file with exactly one point is buffered into
//! a circular region. A land-cover classification grid for that region is
//! fetched from a raster catalog, degrading from a dense sample to an
//! aggregated sample to a flagged placeholder grid. The grid is handed to a
//! landscape metrics engine and the per-class results are labelled.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use landmetrics::catalog::{HttpRasterService, RasterService, Session};
//! use landmetrics::metrics::HttpMetricsEngine;
//! use landmetrics::{Pipeline, PipelineConfig, UploadedFile};
//!
//! let session = Session::new(|| {
//!     let service = HttpRasterService::connect("http://localhost:8090", None, Duration::from_secs(60))?;
//!     Ok(Arc::new(service) as Arc<dyn RasterService>)
//! });
//! let engine = HttpMetricsEngine::new("http://localhost:8091", Duration::from_secs(60));
//! let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(session), Arc::new(engine))?;
//!
//! let upload = UploadedFile::new("site.geojson", std::fs::read("site.geojson").unwrap());
//! let report = pipeline.run(Some(&upload), Some(5000.0))?;
//! for row in &report.dominant.rows {
//!     println!("{}: {:.1} ha", row.label, row.metrics.total_area);
//! }
//! # Ok::<(), landmetrics::Error>(())
//! ```

pub mod acquire;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod legend;
pub mod metrics;
pub mod pipeline;
pub mod types;
pub mod validation;

pub use acquire::{Acquirer, Acquisition};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use geometry::{AnalysisRegion, GeometryLoader, RegionResolver};
pub use legend::Legend;
pub use metrics::{ClassMetrics, ClassMetricsTable, MetricsEngine};
pub use pipeline::{AnalysisReport, Pipeline};
pub use types::{ClassGrid, Dimensions, GridSource};
pub use validation::{validate_upload, UploadedFile};

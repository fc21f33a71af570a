//! Landscape metrics collaborator contract
//!
//! Patch metrics are computed by an external engine behind [`MetricsEngine`].
//! This module owns the grid hand-off (minimum size, diagnostics on failure)
//! and the labelled table the presentation layer renders.

pub mod remote;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::MetricsError;
use crate::legend::Legend;
use crate::types::ClassGrid;

pub use remote::HttpMetricsEngine;

/// Number of metrics computed per class
pub const METRIC_COUNT: usize = 12;

/// Metric names in table order
pub const METRIC_NAMES: [&str; METRIC_COUNT] = [
    "total_area",
    "proportion_of_landscape",
    "number_of_patches",
    "largest_patch_index",
    "total_edge",
    "landscape_shape_index",
    "area_mn",
    "perimeter_mn",
    "perimeter_area_ratio_mn",
    "shape_index_mn",
    "fractal_dimension_mn",
    "euclidean_nearest_neighbor_mn",
];

/// Human description of a metric
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
}

/// Glossary shown next to the table
pub const METRIC_GLOSSARY: [MetricDescriptor; METRIC_COUNT] = [
    MetricDescriptor { name: "total_area", description: "Total area", unit: "ha" },
    MetricDescriptor { name: "proportion_of_landscape", description: "Proportion of the landscape", unit: "%" },
    MetricDescriptor { name: "number_of_patches", description: "Number of patches", unit: "" },
    MetricDescriptor { name: "largest_patch_index", description: "Largest patch index", unit: "%" },
    MetricDescriptor { name: "total_edge", description: "Total edge length", unit: "m" },
    MetricDescriptor { name: "landscape_shape_index", description: "Landscape shape index", unit: "" },
    MetricDescriptor { name: "area_mn", description: "Mean patch area", unit: "ha" },
    MetricDescriptor { name: "perimeter_mn", description: "Mean patch perimeter", unit: "m" },
    MetricDescriptor { name: "perimeter_area_ratio_mn", description: "Mean perimeter/area ratio", unit: "" },
    MetricDescriptor { name: "shape_index_mn", description: "Mean shape index", unit: "" },
    MetricDescriptor { name: "fractal_dimension_mn", description: "Mean fractal dimension", unit: "" },
    MetricDescriptor { name: "euclidean_nearest_neighbor_mn", description: "Mean nearest-neighbor distance", unit: "m" },
];

/// Metrics of one class, as returned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    #[serde(rename = "class")]
    pub class_code: i32,
    #[serde(deserialize_with = "nullable")]
    pub total_area: f64,
    #[serde(deserialize_with = "nullable")]
    pub proportion_of_landscape: f64,
    #[serde(deserialize_with = "nullable")]
    pub number_of_patches: f64,
    #[serde(deserialize_with = "nullable")]
    pub largest_patch_index: f64,
    #[serde(deserialize_with = "nullable")]
    pub total_edge: f64,
    #[serde(deserialize_with = "nullable")]
    pub landscape_shape_index: f64,
    #[serde(deserialize_with = "nullable")]
    pub area_mn: f64,
    #[serde(deserialize_with = "nullable")]
    pub perimeter_mn: f64,
    #[serde(deserialize_with = "nullable")]
    pub perimeter_area_ratio_mn: f64,
    #[serde(deserialize_with = "nullable")]
    pub shape_index_mn: f64,
    #[serde(deserialize_with = "nullable")]
    pub fractal_dimension_mn: f64,
    /// Undefined (NaN) when the class has a single patch
    #[serde(default = "nan", deserialize_with = "nullable")]
    pub euclidean_nearest_neighbor_mn: f64,
}

fn nan() -> f64 {
    f64::NAN
}

/// `null` is how JSON carries an undefined metric
fn nullable<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl ClassMetrics {
    /// Values in [`METRIC_NAMES`] order
    pub fn values(&self) -> [f64; METRIC_COUNT] {
        [
            self.total_area,
            self.proportion_of_landscape,
            self.number_of_patches,
            self.largest_patch_index,
            self.total_edge,
            self.landscape_shape_index,
            self.area_mn,
            self.perimeter_mn,
            self.perimeter_area_ratio_mn,
            self.shape_index_mn,
            self.fractal_dimension_mn,
            self.euclidean_nearest_neighbor_mn,
        ]
    }

    /// Builds metrics from values in [`METRIC_NAMES`] order
    pub fn from_values(class_code: i32, values: [f64; METRIC_COUNT]) -> Self {
        Self {
            class_code,
            total_area: values[0],
            proportion_of_landscape: values[1],
            number_of_patches: values[2],
            largest_patch_index: values[3],
            total_edge: values[4],
            landscape_shape_index: values[5],
            area_mn: values[6],
            perimeter_mn: values[7],
            perimeter_area_ratio_mn: values[8],
            shape_index_mn: values[9],
            fractal_dimension_mn: values[10],
            euclidean_nearest_neighbor_mn: values[11],
        }
    }
}

/// Computes per-class landscape metrics over a class grid
pub trait MetricsEngine: Send + Sync {
    /// One entry per distinct class code present in `grid`
    fn compute_class_metrics(&self, grid: &ClassGrid) -> Result<Vec<ClassMetrics>, MetricsError>;
}

/// Pads the grid to the engine's minimum size
pub fn prepare_grid(grid: &ClassGrid, min_dim: usize) -> ClassGrid {
    if grid.rows() >= min_dim && grid.cols() >= min_dim {
        return grid.clone();
    }
    warn!(
        rows = grid.rows(),
        cols = grid.cols(),
        min_dim,
        "Padding grid below minimum size"
    );
    grid.pad_to_min(min_dim)
}

/// Hands a grid to the engine and labels the result
pub fn compute_table(
    engine: &dyn MetricsEngine,
    grid: &ClassGrid,
    min_dim: usize,
    legend: &Legend,
) -> Result<ClassMetricsTable, MetricsError> {
    let prepared = prepare_grid(grid, min_dim);

    let metrics = engine
        .compute_class_metrics(&prepared)
        .map_err(|e| match e {
            MetricsError::InvalidGrid(message) => MetricsError::Engine {
                message,
                rows: prepared.rows(),
                cols: prepared.cols(),
                distinct: prepared.distinct_classes(),
            },
            other => other,
        })?;

    info!(
        classes = metrics.len(),
        rows = prepared.rows(),
        cols = prepared.cols(),
        "Computed class metrics"
    );
    Ok(ClassMetricsTable::from_metrics(metrics, legend))
}

/// One labelled table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetricsRow {
    pub label: String,
    #[serde(flatten)]
    pub metrics: ClassMetrics,
}

/// Labelled per-class metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassMetricsTable {
    pub rows: Vec<ClassMetricsRow>,
}

impl ClassMetricsTable {
    /// Labels engine output, ordered by class code
    pub fn from_metrics(mut metrics: Vec<ClassMetrics>, legend: &Legend) -> Self {
        metrics.sort_by_key(|m| m.class_code);
        let rows = metrics
            .into_iter()
            .map(|metrics| ClassMetricsRow {
                label: legend.label(metrics.class_code),
                metrics,
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Classes covering more than `min_proportion` percent, largest area first
    pub fn dominant(&self, min_proportion: f64) -> ClassMetricsTable {
        let mut rows: Vec<ClassMetricsRow> = self
            .rows
            .iter()
            .filter(|row| row.metrics.proportion_of_landscape > min_proportion)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.metrics.total_area.total_cmp(&a.metrics.total_area));
        ClassMetricsTable { rows }
    }
}

//! Tiered raster acquisition
//!
//! Tiers run in a fixed order and each runs at most once:
//!
//! 1. dense rectangular sample of the selected layer
//! 2. aggregated value list, padded and reshaped into a square
//! 3. synthetic placeholder grid
//!
//! Upstream errors and unusable data move the ladder to the next tier. Every
//! step down is logged and recorded in [`Acquisition::failures`].

pub mod reshape;
pub mod synthetic;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{
    probe_datasets, BandCache, DatasetSelection, RasterService, RectangleRequest, ReduceRequest,
    Session,
};
use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;
use crate::geometry::AnalysisRegion;
use crate::types::{ClassGrid, GridSource};

/// Ladder step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Session or dataset probe
    Probe,
    Direct,
    Aggregated,
}

/// Why a ladder step was abandoned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierFailure {
    pub stage: Stage,
    pub reason: String,
}

/// A grid and where it came from
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub grid: ClassGrid,
    pub source: GridSource,
    /// Dataset and layer read, absent for synthetic grids
    pub selection: Option<DatasetSelection>,
    /// Aggregated values were topped up with typical classes
    pub padded: bool,
    pub failures: Vec<TierFailure>,
}

impl Acquisition {
    pub fn is_synthetic(&self) -> bool {
        self.source == GridSource::Synthetic
    }
}

/// Runs the acquisition ladder against a session
pub struct Acquirer {
    config: AcquisitionConfig,
    cache: BandCache,
}

impl Acquirer {
    pub fn new(config: AcquisitionConfig) -> Self {
        let cache = BandCache::new(config.band_cache_capacity);
        Self { config, cache }
    }

    /// Obtains a class grid for the region, degrading tier by tier
    ///
    /// When both samples fail for a dataset whose band list came from the
    /// cache, that entry is dropped and the datasets are probed again.
    pub fn acquire(
        &self,
        session: &Session,
        region: &AnalysisRegion,
    ) -> Result<Acquisition, AcquisitionError> {
        let mut failures = Vec::new();

        match session.service() {
            Ok(service) => {
                let mut probed = self.probe(service.as_ref());
                loop {
                    let selection = match probed {
                        Ok(selection) => selection,
                        Err(e) => {
                            warn!(error = %e, "No dataset available, falling back to synthetic grid");
                            failures.push(TierFailure {
                                stage: Stage::Probe,
                                reason: e.to_string(),
                            });
                            break;
                        }
                    };

                    if let Some(acquisition) =
                        self.sample(service.as_ref(), selection.clone(), region, &mut failures)
                    {
                        return Ok(acquisition);
                    }
                    if !selection.from_cache {
                        break;
                    }

                    warn!(dataset = %selection.dataset, "Dropping cached band list and probing datasets again");
                    self.cache.invalidate(&selection.dataset);
                    probed = self.probe(service.as_ref());
                    if matches!(&probed, Ok(next) if next.dataset == selection.dataset) {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Raster session unavailable, falling back to synthetic grid");
                failures.push(TierFailure {
                    stage: Stage::Probe,
                    reason: e.to_string(),
                });
            }
        }

        let grid = self.synthetic(&failures)?;
        warn!(
            failures = failures.len(),
            "Serving synthetic placeholder grid; results are not authoritative"
        );
        Ok(Acquisition {
            grid,
            source: GridSource::Synthetic,
            selection: None,
            padded: false,
            failures,
        })
    }

    fn probe(&self, service: &dyn RasterService) -> Result<DatasetSelection, AcquisitionError> {
        probe_datasets(
            service,
            &self.config.datasets,
            &self.config.layer_prefix,
            &self.cache,
        )
    }

    /// Tiers 1 and 2 against one selection; `None` when both failed
    fn sample(
        &self,
        service: &dyn RasterService,
        selection: DatasetSelection,
        region: &AnalysisRegion,
        failures: &mut Vec<TierFailure>,
    ) -> Option<Acquisition> {
        match self.direct(service, &selection, region) {
            Ok(grid) => {
                info!(
                    dataset = %selection.dataset,
                    layer = %selection.layer,
                    rows = grid.rows(),
                    cols = grid.cols(),
                    "Acquired grid from rectangular sample"
                );
                return Some(Acquisition {
                    grid,
                    source: GridSource::Direct,
                    selection: Some(selection),
                    padded: false,
                    failures: std::mem::take(failures),
                });
            }
            Err(e) => {
                warn!(dataset = %selection.dataset, error = %e, "Rectangular sample failed, trying aggregated sample");
                failures.push(TierFailure {
                    stage: Stage::Direct,
                    reason: e.to_string(),
                });
            }
        }

        match self.aggregated(service, &selection, region) {
            Ok((grid, padded)) => {
                warn!(
                    dataset = %selection.dataset,
                    layer = %selection.layer,
                    side = grid.rows(),
                    padded,
                    "Using degraded grid from aggregated sample"
                );
                Some(Acquisition {
                    grid,
                    source: GridSource::Aggregated,
                    selection: Some(selection),
                    padded,
                    failures: std::mem::take(failures),
                })
            }
            Err(e) => {
                warn!(dataset = %selection.dataset, error = %e, "Aggregated sample failed");
                failures.push(TierFailure {
                    stage: Stage::Aggregated,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Tier 1: dense sample, rejected when empty or entirely fill value
    fn direct(
        &self,
        service: &dyn RasterService,
        selection: &DatasetSelection,
        region: &AnalysisRegion,
    ) -> Result<ClassGrid, AcquisitionError> {
        let arrays = service.sample_rectangle(&RectangleRequest {
            dataset: &selection.dataset,
            band: &selection.layer,
            region,
            default_value: self.config.fill_value,
        })?;

        let rows = match arrays.get(&selection.layer) {
            Some(rows) => rows,
            None if arrays.len() == 1 => arrays.values().next().ok_or_else(|| {
                AcquisitionError::Insufficient("sample has no bands".to_string())
            })?,
            None => {
                return Err(AcquisitionError::Insufficient(format!(
                    "band {} missing from sample",
                    selection.layer
                )))
            }
        };

        let rows = rows
            .iter()
            .map(|row| row.iter().map(|&v| to_class(v)).collect::<Result<Vec<_>, _>>())
            .collect::<Result<Vec<_>, _>>()?;

        let grid = ClassGrid::from_rows(&rows, self.config.resolution_m).ok_or_else(|| {
            AcquisitionError::Insufficient("sample is empty or not rectangular".to_string())
        })?;

        if grid.is_uniform(self.config.fill_value) {
            return Err(AcquisitionError::Insufficient(format!(
                "all {} pixels equal fill value {}",
                grid.dims().pixel_count(),
                self.config.fill_value
            )));
        }

        Ok(grid)
    }

    /// Tier 2: flat value list, null and zero dropped, padded and squared
    fn aggregated(
        &self,
        service: &dyn RasterService,
        selection: &DatasetSelection,
        region: &AnalysisRegion,
    ) -> Result<(ClassGrid, bool), AcquisitionError> {
        let values = service.reduce_region(&ReduceRequest {
            dataset: &selection.dataset,
            band: &selection.layer,
            region,
            scale_m: self.config.sample_scale_m,
            max_pixels: self.config.max_pixels,
            best_effort: self.config.best_effort,
        })?;

        let total = values.len();
        let valid = values
            .into_iter()
            .flatten()
            .filter(|&v| v != 0)
            .map(to_class)
            .collect::<Result<Vec<_>, _>>()?;

        if valid.is_empty() {
            return Err(AcquisitionError::Insufficient(format!(
                "none of {} sampled values is a valid class",
                total
            )));
        }

        let found = valid.len();
        let (values, padded) = reshape::pad_to_threshold(
            valid,
            self.config.min_valid_pixels,
            &self.config.typical_classes,
        );
        if padded {
            warn!(
                found,
                threshold = self.config.min_valid_pixels,
                "Padded sparse sample with typical classes"
            );
        }

        let grid = reshape::reshape_square(&values, self.config.resolution_m).ok_or_else(|| {
            AcquisitionError::Insufficient("no values to reshape".to_string())
        })?;
        Ok((grid, padded))
    }

    /// Tier 3: configured or built-in placeholder
    fn synthetic(&self, failures: &[TierFailure]) -> Result<ClassGrid, AcquisitionError> {
        match &self.config.synthetic_grid {
            None => Ok(synthetic::placeholder(self.config.resolution_m)),
            Some(rows) => ClassGrid::from_rows(rows, self.config.resolution_m).ok_or_else(|| {
                let mut reasons: Vec<String> = failures
                    .iter()
                    .map(|f| format!("{:?}: {}", f.stage, f.reason))
                    .collect();
                reasons.push("configured synthetic grid is empty or not rectangular".to_string());
                AcquisitionError::Exhausted(reasons.join("; "))
            }),
        }
    }
}

fn to_class(value: i64) -> Result<i32, AcquisitionError> {
    i32::try_from(value)
        .map_err(|_| AcquisitionError::Insufficient(format!("value {} is not a class code", value)))
}

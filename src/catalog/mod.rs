//! Remote classification raster catalog
//!
//! [`RasterService`] is the seam to the remote catalog. [`Session`] owns the
//! process-wide connection, created lazily and at most once, and
//! [`probe_datasets`] picks the dataset and layer a request will read.

pub mod cache;
pub mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AcquisitionError;
use crate::geometry::AnalysisRegion;

pub use cache::BandCache;
pub use http::HttpRasterService;

/// Dense sample: band name -> rows of pixel values
pub type BandArrays = HashMap<String, Vec<Vec<i64>>>;

/// Dense rectangular sample clipped to a region
#[derive(Debug, Clone, Copy)]
pub struct RectangleRequest<'a> {
    pub dataset: &'a str,
    pub band: &'a str,
    pub region: &'a AnalysisRegion,
    /// Value substituted for masked pixels
    pub default_value: i32,
}

/// Flat list of pixel values intersecting a region
#[derive(Debug, Clone, Copy)]
pub struct ReduceRequest<'a> {
    pub dataset: &'a str,
    pub band: &'a str,
    pub region: &'a AnalysisRegion,
    pub scale_m: f64,
    pub max_pixels: u64,
    pub best_effort: bool,
}

/// Blocking access to a classification raster catalog
pub trait RasterService: Send + Sync {
    /// Band (layer) names of a dataset; empty when the dataset has none
    fn list_bands(&self, dataset: &str) -> Result<Vec<String>, AcquisitionError>;

    /// Dense array per band at native resolution
    fn sample_rectangle(&self, request: &RectangleRequest<'_>) -> Result<BandArrays, AcquisitionError>;

    /// Per-pixel values in source order, `None` for masked pixels
    fn reduce_region(&self, request: &ReduceRequest<'_>) -> Result<Vec<Option<i64>>, AcquisitionError>;
}

type Connector = Box<dyn Fn() -> Result<Arc<dyn RasterService>, AcquisitionError> + Send + Sync>;

/// Lazily established, shared handle to the raster service
///
/// Concurrent first callers block on a single connection attempt. A failed
/// attempt is not remembered, so the next request tries again.
pub struct Session {
    handle: OnceCell<Arc<dyn RasterService>>,
    connector: Connector,
    attempts: AtomicUsize,
}

impl Session {
    /// Creates a session that connects on first use
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RasterService>, AcquisitionError> + Send + Sync + 'static,
    {
        Self {
            handle: OnceCell::new(),
            connector: Box::new(connector),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Creates a session around an already connected service
    pub fn connected(service: Arc<dyn RasterService>) -> Self {
        Self {
            handle: OnceCell::with_value(service),
            connector: Box::new(|| {
                Err(AcquisitionError::Unavailable(
                    "session was created connected".to_string(),
                ))
            }),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Returns the service, connecting first if needed
    pub fn service(&self) -> Result<Arc<dyn RasterService>, AcquisitionError> {
        self.handle
            .get_or_try_init(|| {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                info!(attempt, "Connecting to raster service");
                (self.connector)()
            })
            .map(Arc::clone)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Number of connection attempts made so far
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Dataset and layer chosen for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSelection {
    pub dataset: String,
    pub layer: String,
    /// Year parsed from the layer name
    pub year: Option<i32>,
    /// Band list came from the cache rather than the service
    #[serde(skip)]
    pub from_cache: bool,
}

/// Picks the most recent `<prefix>_<year>` layer
///
/// Falls back to the last listed band when no name follows the convention.
pub fn latest_layer(bands: &[String], prefix: &str) -> Option<(String, Option<i32>)> {
    let marker = format!("{}_", prefix);
    let newest = bands
        .iter()
        .filter_map(|band| {
            let year = band.strip_prefix(&marker)?;
            if year.len() != 4 {
                return None;
            }
            year.parse::<i32>().ok().map(|year| (band, year))
        })
        .max_by_key(|(_, year)| *year);

    match newest {
        Some((band, year)) => Some((band.clone(), Some(year))),
        None => bands.last().map(|band| (band.clone(), None)),
    }
}

/// Probes datasets in priority order; the first with bands wins
pub fn probe_datasets(
    service: &dyn RasterService,
    datasets: &[String],
    prefix: &str,
    cache: &BandCache,
) -> Result<DatasetSelection, AcquisitionError> {
    let mut failures = Vec::new();

    for dataset in datasets {
        let cached = cache.get(dataset);
        let from_cache = cached.is_some();
        let bands = match cached {
            Some(bands) => {
                debug!(dataset = %dataset, "Band list served from cache");
                bands
            }
            None => match service.list_bands(dataset) {
                Ok(bands) => cache.put(dataset, bands),
                Err(e) => {
                    warn!(dataset = %dataset, error = %e, "Dataset probe failed");
                    failures.push(format!("{}: {}", dataset, e));
                    continue;
                }
            },
        };

        if let Some((layer, year)) = latest_layer(&bands, prefix) {
            info!(dataset = %dataset, layer = %layer, "Selected classification layer");
            return Ok(DatasetSelection {
                dataset: dataset.clone(),
                layer,
                year,
                from_cache,
            });
        }

        warn!(dataset = %dataset, "Dataset has no bands");
        failures.push(format!("{}: no bands", dataset));
    }

    Err(AcquisitionError::Unavailable(if failures.is_empty() {
        "no datasets configured".to_string()
    } else {
        failures.join("; ")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct BandsOnly {
        bands: HashMap<String, Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl RasterService for BandsOnly {
        fn list_bands(&self, dataset: &str) -> Result<Vec<String>, AcquisitionError> {
            self.calls.lock().unwrap().push(dataset.to_string());
            self.bands
                .get(dataset)
                .cloned()
                .ok_or_else(|| AcquisitionError::Request(format!("{} not found", dataset)))
        }

        fn sample_rectangle(&self, _: &RectangleRequest<'_>) -> Result<BandArrays, AcquisitionError> {
            Err(AcquisitionError::Request("unused".into()))
        }

        fn reduce_region(&self, _: &ReduceRequest<'_>) -> Result<Vec<Option<i64>>, AcquisitionError> {
            Err(AcquisitionError::Request("unused".into()))
        }
    }

    #[test]
    fn test_latest_layer() {
        let bands = names(&["classification_1985", "classification_2020", "classification_2003"]);
        assert_eq!(
            latest_layer(&bands, "classification"),
            Some(("classification_2020".to_string(), Some(2020)))
        );
    }

    #[test]
    fn test_latest_layer_without_convention() {
        let bands = names(&["b1", "b2"]);
        assert_eq!(latest_layer(&bands, "classification"), Some(("b2".to_string(), None)));
        assert_eq!(latest_layer(&[], "classification"), None);
    }

    #[test]
    fn test_probe_skips_failed_and_empty_datasets() {
        let mut bands = HashMap::new();
        bands.insert("empty".to_string(), Vec::new());
        bands.insert("good".to_string(), names(&["classification_2021", "classification_2022"]));
        let service = BandsOnly {
            bands,
            calls: Mutex::new(Vec::new()),
        };

        let datasets = names(&["missing", "empty", "good", "never"]);
        let cache = BandCache::new(4);
        let selection = probe_datasets(&service, &datasets, "classification", &cache).unwrap();

        assert_eq!(selection.dataset, "good");
        assert_eq!(selection.layer, "classification_2022");
        assert_eq!(selection.year, Some(2022));
        assert!(!selection.from_cache);
        assert_eq!(*service.calls.lock().unwrap(), names(&["missing", "empty", "good"]));

        // Second probe is served from cache for the winner
        let again = probe_datasets(&service, &datasets, "classification", &cache).unwrap();
        assert!(again.from_cache);
        assert_eq!(service.calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_probe_all_fail() {
        let service = BandsOnly {
            bands: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        };
        let datasets = names(&["a", "b", "c", "d"]);
        let result = probe_datasets(&service, &datasets, "classification", &BandCache::new(4));
        assert!(matches!(result, Err(AcquisitionError::Unavailable(_))));
        assert_eq!(service.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_session_connects_once() {
        let session = Arc::new(Session::new(|| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(BandsOnly {
                bands: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }) as Arc<dyn RasterService>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.service().is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert!(session.is_connected());
        assert_eq!(session.connect_attempts(), 1);
    }

    #[test]
    fn test_session_retries_after_failure() {
        let session = Session::new(|| Err(AcquisitionError::Unavailable("no credentials".into())));
        assert!(session.service().is_err());
        assert!(session.service().is_err());
        assert!(!session.is_connected());
        assert_eq!(session.connect_attempts(), 2);
    }
}

//! Pipeline configuration
//!
//! Every tunable has a default so a partial JSON file is enough.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::DEFAULT_RESOLUTION_M;

/// MapBiomas collections, newest first
pub const DEFAULT_DATASETS: [&str; 4] = [
    "projects/mapbiomas-public/assets/brazil/lulc/collection9/mapbiomas_collection90_integration_v1",
    "projects/mapbiomas-public/assets/brazil/lulc/collection8/mapbiomas_collection80_integration_v1",
    "projects/mapbiomas-workspace/public/collection7_1/mapbiomas_collection71_integration_v1",
    "projects/mapbiomas-workspace/public/collection6/mapbiomas_collection60_integration_v1",
];

/// Classes used to pad sparse aggregated samples: forest formation, savanna,
/// grassland, pasture, agriculture/pasture mosaic, river/lake/ocean
pub const DEFAULT_TYPICAL_CLASSES: [i32; 6] = [3, 4, 12, 15, 21, 33];

/// Upload acceptance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Maximum accepted upload size in bytes
    pub max_bytes: usize,
    /// Accepted extensions, with leading dot, compared case-insensitively
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec![".geojson".to_string()],
        }
    }
}

/// Buffer radius bounds and geometry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub min_radius_m: f64,
    pub max_radius_m: f64,
    pub default_radius_m: f64,
    /// Vertices on the buffered ring
    pub buffer_segments: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_radius_m: 1000.0,
            max_radius_m: 5000.0,
            default_radius_m: 2500.0,
            buffer_segments: 64,
        }
    }
}

/// Raster acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Dataset identifiers probed in order
    pub datasets: Vec<String>,
    /// Layer naming prefix; layers are `<prefix>_<year>`
    pub layer_prefix: String,
    /// Linear pixel size handed to the metrics engine
    pub resolution_m: f64,
    /// Value used by the service for missing pixels in rectangular samples
    pub fill_value: i32,
    /// Sampling scale for aggregated samples, in meters
    pub sample_scale_m: f64,
    /// Pixel budget for aggregated samples
    pub max_pixels: u64,
    /// Let the service relax the scale if the budget is exceeded
    pub best_effort: bool,
    /// Minimum number of valid values before padding kicks in
    pub min_valid_pixels: usize,
    /// Codes cycled through when padding sparse samples
    pub typical_classes: Vec<i32>,
    /// Replaces the built-in placeholder grid
    pub synthetic_grid: Option<Vec<Vec<i32>>>,
    /// Number of dataset band lists kept in memory
    pub band_cache_capacity: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            datasets: DEFAULT_DATASETS.iter().map(|s| s.to_string()).collect(),
            layer_prefix: "classification".to_string(),
            resolution_m: DEFAULT_RESOLUTION_M,
            fill_value: 0,
            sample_scale_m: DEFAULT_RESOLUTION_M,
            max_pixels: 10_000_000,
            best_effort: true,
            min_valid_pixels: 9,
            typical_classes: DEFAULT_TYPICAL_CLASSES.to_vec(),
            synthetic_grid: None,
            band_cache_capacity: 16,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub upload: UploadPolicy,
    pub region: RegionConfig,
    pub acquisition: AcquisitionConfig,
    /// Grids smaller than this in either dimension are padded before metrics
    pub min_grid_dim: usize,
    /// Classes above this share of the landscape (percent) are highlighted
    pub dominant_min_proportion: f64,
    /// Directory for upload scratch files; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Replaces the built-in class legend (index = class code)
    pub legend: Option<Vec<String>>,
}

impl PipelineConfig {
    /// Loads a configuration file and validates it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::info!(path = %path.as_ref().display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Directory used for upload scratch files
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Rejects inconsistent settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = &self.region;
        if !(region.min_radius_m > 0.0 && region.min_radius_m <= region.max_radius_m) {
            return Err(ConfigError::Invalid(format!(
                "radius bounds [{}, {}] are not a positive range",
                region.min_radius_m, region.max_radius_m
            )));
        }
        if region.default_radius_m < region.min_radius_m
            || region.default_radius_m > region.max_radius_m
        {
            return Err(ConfigError::Invalid(format!(
                "default radius {} is outside [{}, {}]",
                region.default_radius_m, region.min_radius_m, region.max_radius_m
            )));
        }
        if region.buffer_segments < 3 {
            return Err(ConfigError::Invalid(
                "buffer_segments must be at least 3".to_string(),
            ));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".to_string(),
            ));
        }

        let acquisition = &self.acquisition;
        if acquisition.resolution_m <= 0.0 || acquisition.sample_scale_m <= 0.0 {
            return Err(ConfigError::Invalid(
                "resolution and sample scale must be positive".to_string(),
            ));
        }
        if acquisition.min_valid_pixels == 0 {
            return Err(ConfigError::Invalid(
                "min_valid_pixels must be positive".to_string(),
            ));
        }
        if acquisition.typical_classes.is_empty() {
            return Err(ConfigError::Invalid(
                "typical_classes must not be empty".to_string(),
            ));
        }
        if self.min_grid_dim == 0 {
            return Err(ConfigError::Invalid(
                "min_grid_dim must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload: UploadPolicy::default(),
            region: RegionConfig::default(),
            acquisition: AcquisitionConfig::default(),
            min_grid_dim: 3,
            dominant_min_proportion: 10.0,
            temp_dir: None,
            legend: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition.datasets.len(), 4);
        assert_eq!(config.acquisition.min_valid_pixels, 9);
        assert_eq!(config.min_grid_dim, 3);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"region": {{"max_radius_m": 8000.0}}, "min_grid_dim": 4}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region.max_radius_m, 8000.0);
        assert_eq!(config.region.min_radius_m, 1000.0);
        assert_eq!(config.min_grid_dim, 4);
        assert_eq!(config.upload.allowed_extensions, vec![".geojson"]);
    }

    #[test]
    fn test_inverted_radius_bounds_rejected() {
        let mut config = PipelineConfig::default();
        config.region.min_radius_m = 6000.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_typical_classes_rejected() {
        let mut config = PipelineConfig::default();
        config.acquisition.typical_classes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}

//! Error types for landmetrics

use thiserror::Error;

/// Result type for landmetrics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Rejection reasons produced by the upload validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No file was supplied
    #[error("no file was uploaded")]
    Missing,

    /// File is larger than the configured limit
    #[error("file is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    /// Extension is not in the allow-list
    #[error("extension of '{name}' is not allowed (expected one of: {allowed})")]
    Extension { name: String, allowed: String },

    /// Filename contains a path-traversal or shell metacharacter
    #[error("filename '{name}' contains forbidden sequence '{sequence}'")]
    UnsafeName { name: String, sequence: String },
}

/// Failures turning uploaded bytes into point features
#[derive(Error, Debug)]
pub enum GeometryError {
    /// Neither the structured nor the manual parse produced a point
    #[error("no point geometry found in upload")]
    Empty,

    /// The document could not be parsed at all
    #[error("could not parse geometry file: {0}")]
    Parse(String),

    /// A coordinate reference system other than WGS84 was declared
    #[error("unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    /// A point lies outside longitude/latitude bounds
    #[error("coordinate ({lon}, {lat}) is outside WGS84 bounds")]
    InvalidCoordinate { lon: f64, lat: f64 },

    /// Temporary storage failed or escaped its directory
    #[error("temporary storage error: {0}")]
    Storage(String),
}

/// Failures turning point features into an analysis region
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    #[error("no point of interest found; select exactly one point")]
    NoPoint,

    #[error("{0} points of interest found; select exactly one point")]
    MultiplePoints(usize),

    #[error("buffer radius {radius} m is outside [{min}, {max}] m")]
    RadiusOutOfRange { radius: f64, min: f64, max: f64 },

    #[error("buffered region has no area")]
    DegenerateGeometry,
}

/// Failures inside the raster acquisition ladder
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// The raster service session could not be established
    #[error("raster service unavailable: {0}")]
    Unavailable(String),

    /// An upstream request failed
    #[error("raster request failed: {0}")]
    Request(String),

    /// The upstream answered with data unusable as a grid
    #[error("insufficient data: {0}")]
    Insufficient(String),

    /// Every tier, including the synthetic one, failed
    #[error("all acquisition tiers failed: {0}")]
    Exhausted(String),
}

/// Failures reported by the metrics collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// The grid cannot be handed to the engine
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// The engine failed while processing a grid
    #[error("metrics engine failed on {rows}x{cols} grid with classes {distinct:?}: {message}")]
    Engine {
        message: String,
        rows: usize,
        cols: usize,
        distinct: Vec<i32>,
    },
}

/// Invalid or unreadable configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("export failed: {0}")]
    Export(String),
}

impl Error {
    /// Short machine-readable category name
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Geometry(_) => "geometry",
            Error::Region(_) => "region",
            Error::Acquisition(_) => "acquisition",
            Error::Metrics(_) => "metrics",
            Error::Config(_) => "config",
            Error::Export(_) => "export",
        }
    }

    /// Whether the user can fix the problem by changing the upload or radius
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Geometry(_) | Error::Region(_)
        )
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Export(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(RegionError::MultiplePoints(2));
        assert_eq!(
            err.to_string(),
            "2 points of interest found; select exactly one point"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::from(ValidationError::Missing).kind(), "validation");
        assert_eq!(Error::from(GeometryError::Empty).kind(), "geometry");
        assert_eq!(
            Error::from(AcquisitionError::Exhausted("x".into())).kind(),
            "acquisition"
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(Error::from(RegionError::NoPoint).is_user_error());
        assert!(!Error::from(MetricsError::InvalidGrid("empty".into())).is_user_error());
    }

    #[test]
    fn test_metrics_error_carries_diagnostics() {
        let err = MetricsError::Engine {
            message: "boom".into(),
            rows: 3,
            cols: 4,
            distinct: vec![3, 15],
        };
        let text = err.to_string();
        assert!(text.contains("3x4"));
        assert!(text.contains("[3, 15]"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = ConfigError::from(io_err).into();
        assert!(matches!(err, Error::Config(ConfigError::Io(_))));
    }
}

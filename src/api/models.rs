use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{Error, GeometryError};
use crate::legend::LegendEntry;
use crate::metrics::MetricDescriptor;
use crate::validation::UploadedFile;

/// Multipart form of the analyze endpoints
#[derive(Debug, Default)]
pub struct AnalyzeForm {
    pub file: Option<UploadedFile>,
    pub radius: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub raster_connected: bool,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LegendResponse {
    pub classes: Vec<LegendEntry>,
}

#[derive(Debug, Serialize)]
pub struct MetricsGlossaryResponse {
    pub metrics: Vec<MetricDescriptor>,
}

/// Error rendered as `{"error": ..., "kind": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind: kind.to_string(),
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", error)
    }
}

/// HTTP status for a pipeline error
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Geometry(GeometryError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Geometry(_) | Error::Region(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Metrics(_) => StatusCode::BAD_GATEWAY,
        Error::Acquisition(_) | Error::Config(_) | Error::Export(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(status_for(&error), error.kind(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

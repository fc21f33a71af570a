//! Metrics engine reached over HTTP

use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassMetrics, MetricsEngine, METRIC_NAMES};
use crate::error::MetricsError;
use crate::types::ClassGrid;

/// Posts grids to `<base>/class-metrics`
///
/// Request: `{"grid": [[...]], "resolution": [30, 30], "metrics": [...]}`.
/// Response: `{"classes": [{"class": 3, "total_area": ..., ...}]}`.
pub struct HttpMetricsEngine {
    base_url: String,
    timeout: Duration,
    client: OnceCell<Client>,
}

#[derive(Serialize)]
struct MetricsRequest<'a> {
    grid: Vec<Vec<i32>>,
    resolution: [f64; 2],
    metrics: &'a [&'static str],
}

#[derive(Deserialize)]
struct MetricsResponse {
    classes: Vec<ClassMetrics>,
}

impl HttpMetricsEngine {
    /// The HTTP client is built on first use, on the calling thread
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&Client, String> {
        self.client
            .get_or_try_init(|| Client::builder().timeout(self.timeout).build())
            .map_err(|e| e.to_string())
    }
}

impl MetricsEngine for HttpMetricsEngine {
    fn compute_class_metrics(&self, grid: &ClassGrid) -> Result<Vec<ClassMetrics>, MetricsError> {
        let failure = |message: String| MetricsError::Engine {
            message,
            rows: grid.rows(),
            cols: grid.cols(),
            distinct: grid.distinct_classes(),
        };

        let body = MetricsRequest {
            grid: grid.to_rows(),
            resolution: [grid.resolution_m(), grid.resolution_m()],
            metrics: &METRIC_NAMES,
        };

        debug!(rows = grid.rows(), cols = grid.cols(), "Requesting class metrics");
        let response: MetricsResponse = self
            .client()
            .map_err(failure)?
            .post(format!("{}/class-metrics", self.base_url))
            .json(&body)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|e| failure(e.to_string()))?;

        Ok(response.classes)
    }
}

//! JSON-over-HTTP raster catalog client

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BandArrays, RasterService, RectangleRequest, ReduceRequest};
use crate::error::AcquisitionError;

/// Blocking client for a raster catalog gateway
///
/// Endpoints, relative to the base URL:
/// - `GET  health`
/// - `GET  bands?dataset=<id>` -> `{"bands": [...]}`
/// - `POST sample-rectangle` -> `{"bands": {"<band>": [[...]]}}`
/// - `POST reduce-region` -> `{"values": [...]}`
pub struct HttpRasterService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct BandsResponse {
    bands: Vec<String>,
}

#[derive(Deserialize)]
struct RectangleResponse {
    bands: HashMap<String, Vec<Vec<i64>>>,
}

#[derive(Deserialize)]
struct ReduceResponse {
    values: Vec<Option<i64>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RectangleBody<'a> {
    dataset: &'a str,
    band: &'a str,
    region: geojson::Geometry,
    default_value: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReduceBody<'a> {
    dataset: &'a str,
    band: &'a str,
    region: geojson::Geometry,
    reducer: &'static str,
    scale: f64,
    max_pixels: u64,
    best_effort: bool,
}

impl HttpRasterService {
    /// Builds the client and checks that the gateway answers
    pub fn connect(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AcquisitionError::Unavailable(e.to_string()))?;

        let service = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        };

        service
            .authorize(service.client.get(service.url("health")))
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| AcquisitionError::Unavailable(e.to_string()))?;

        info!(base_url = %service.base_url, "Raster service session established");
        Ok(service)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AcquisitionError> {
        debug!(path, "Raster service request");
        self.authorize(self.client.post(self.url(path)).json(body))
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json::<R>())
            .map_err(|e| AcquisitionError::Request(e.to_string()))
    }
}

impl RasterService for HttpRasterService {
    fn list_bands(&self, dataset: &str) -> Result<Vec<String>, AcquisitionError> {
        let response: BandsResponse = self
            .authorize(self.client.get(self.url("bands")).query(&[("dataset", dataset)]))
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|e| AcquisitionError::Request(e.to_string()))?;
        Ok(response.bands)
    }

    fn sample_rectangle(&self, request: &RectangleRequest<'_>) -> Result<BandArrays, AcquisitionError> {
        let body = RectangleBody {
            dataset: request.dataset,
            band: request.band,
            region: request.region.to_geojson(),
            default_value: request.default_value,
        };
        let response: RectangleResponse = self.post_json("sample-rectangle", &body)?;
        Ok(response.bands)
    }

    fn reduce_region(&self, request: &ReduceRequest<'_>) -> Result<Vec<Option<i64>>, AcquisitionError> {
        let body = ReduceBody {
            dataset: request.dataset,
            band: request.band,
            region: request.region.to_geojson(),
            reducer: "toList",
            scale: request.scale_m,
            max_pixels: request.max_pixels,
            best_effort: request.best_effort,
        };
        let response: ReduceResponse = self.post_json("reduce-region", &body)?;
        Ok(response.values)
    }
}

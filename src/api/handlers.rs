use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::Multipart;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use tracing::{error, warn};

use super::models::*;
use super::AppState;
use crate::export::{export_filename, table_to_bytes};
use crate::metrics::METRIC_GLOSSARY;
use crate::pipeline::AnalysisReport;
use crate::validation::UploadedFile;

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisReport>, ApiError> {
    let form = read_form(multipart).await?;
    let report = run_analysis(&state, form).await?;
    Ok(Json(report))
}

/// Runs an analysis and returns the dominant-class table as a download
pub async fn analyze_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let report = run_analysis(&state, form).await?;
    let bytes = table_to_bytes(&report.dominant)?;
    let filename = export_filename(chrono::Utc::now());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.as_ref())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    if report.synthetic {
        builder = builder.header("x-landmetrics-synthetic", "true");
    }
    builder
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(e.to_string()))
}

pub async fn legend(State(state): State<Arc<AppState>>) -> Json<LegendResponse> {
    Json(LegendResponse {
        classes: state.pipeline.legend().entries(),
    })
}

pub async fn metrics_glossary() -> Json<MetricsGlossaryResponse> {
    Json(MetricsGlossaryResponse {
        metrics: METRIC_GLOSSARY.to_vec(),
    })
}

/// Liveness; does not open the raster session
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        raster_connected: state.pipeline.session().is_connected(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, ApiError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if form.file.is_some() {
                    return Err(ApiError::bad_request("only one file may be uploaded"));
                }
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("could not read upload: {}", e)))?;
                form.file = Some(UploadedFile::new(file_name, bytes.to_vec()));
            }
            "radius" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("could not read radius: {}", e)))?;
                let text = text.trim();
                if !text.is_empty() {
                    let radius = text
                        .parse::<f64>()
                        .map_err(|_| ApiError::bad_request(format!("radius '{}' is not a number", text)))?;
                    form.radius = Some(radius);
                }
            }
            other => warn!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(form)
}

async fn run_analysis(state: &Arc<AppState>, form: AnalyzeForm) -> Result<AnalysisReport, ApiError> {
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || state.pipeline.run(form.file.as_ref(), form.radius))
        .await
        .map_err(|e| {
            error!(error = %e, "Analysis task failed");
            ApiError::internal("analysis task failed")
        })?;

    result.map_err(|e| {
        if e.is_user_error() {
            warn!(kind = e.kind(), error = %e, "Analysis rejected");
        } else {
            error!(kind = e.kind(), error = %e, "Analysis failed");
        }
        ApiError::from(e)
    })
}

//! Land-cover metrics API server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use landmetrics::api::{create_router, AppState};
use landmetrics::catalog::{HttpRasterService, RasterService, Session};
use landmetrics::metrics::HttpMetricsEngine;
use landmetrics::{Pipeline, PipelineConfig};

/// Land-cover metrics API server
#[derive(Parser, Debug)]
#[command(name = "api-server")]
#[command(about = "HTTP API computing landscape metrics around an uploaded point")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000", env = "LANDMETRICS_LISTEN_ADDR")]
    listen: String,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, env = "LANDMETRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the raster catalog gateway
    #[arg(long, default_value = "http://localhost:8090", env = "RASTER_SERVICE_URL")]
    raster_url: String,

    /// Bearer token for the raster gateway
    #[arg(long, env = "RASTER_SERVICE_TOKEN", hide_env_values = true)]
    raster_token: Option<String>,

    /// Base URL of the landscape metrics service
    #[arg(long, default_value = "http://localhost:8091", env = "METRICS_SERVICE_URL")]
    metrics_url: String,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 120, env = "LANDMETRICS_UPSTREAM_TIMEOUT")]
    timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long, env = "LANDMETRICS_JSON_LOGS")]
    json_logs: bool,

    /// Number of worker threads
    #[arg(long, env = "LANDMETRICS_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let state = Arc::new(build_state(&args)?);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    // Last handle is dropped outside the runtime; it may own blocking clients
    let result = runtime.block_on(serve(args, Arc::clone(&state)));
    drop(runtime);
    drop(state);
    result
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}

fn build_state(args: &Args) -> Result<AppState> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let timeout = Duration::from_secs(args.timeout_secs);
    let raster_url = args.raster_url.clone();
    let raster_token = args.raster_token.clone();
    let session = Session::new(move || {
        let service = HttpRasterService::connect(&raster_url, raster_token.clone(), timeout)?;
        Ok(Arc::new(service) as Arc<dyn RasterService>)
    });

    let engine = HttpMetricsEngine::new(&args.metrics_url, timeout);
    let pipeline = Pipeline::new(config, Arc::new(session), Arc::new(engine))
        .context("Invalid pipeline configuration")?;

    Ok(AppState::new(pipeline))
}

async fn serve(args: Args, state: Arc<AppState>) -> Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", args.listen))?;

    info!(
        %addr,
        raster_url = %args.raster_url,
        metrics_url = %args.metrics_url,
        "Landmetrics API listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}

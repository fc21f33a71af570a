use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use landmetrics::catalog::{HttpRasterService, RasterService, Session};
use landmetrics::export::{export_filename, write_table};
use landmetrics::metrics::{HttpMetricsEngine, METRIC_GLOSSARY};
use landmetrics::{AnalysisReport, Pipeline, PipelineConfig, UploadedFile};

/// Landscape metrics around a single point of interest
#[derive(Parser, Debug)]
#[command(name = "landmetrics")]
#[command(about = "Computes land-cover landscape metrics in a circular region around a point")]
struct Args {
    /// GeoJSON (or KML, if allowed by the config) file with one point
    file: PathBuf,

    /// Buffer radius in meters (default from config)
    #[arg(short, long)]
    radius: Option<f64>,

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
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Write the dominant-class table to this file or directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

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
    let pipeline = Pipeline::new(config, Arc::new(session), Arc::new(engine))?;

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let upload = UploadedFile::new(name, bytes);

    let report = pipeline
        .run(Some(&upload), args.radius)
        .with_context(|| format!("Analysis of {} failed", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(output) = &args.output {
        let path = if output.is_dir() {
            output.join(export_filename(chrono::Utc::now()))
        } else {
            output.clone()
        };
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_table(&report.dominant, file)?;
        eprintln!("Wrote {}", path.display());
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let region = &report.region;
    println!(
        "Region: ({:.5}, {:.5}) radius {} m, {:.1} ha",
        region.longitude, region.latitude, region.radius_m, region.area_ha
    );
    match &report.selection {
        Some(selection) => println!(
            "Data: {} / {} ({} grid, {}x{})",
            selection.dataset,
            selection.layer,
            report.source.name(),
            report.grid.rows,
            report.grid.cols
        ),
        None => println!("Data: {} grid, {}x{}", report.source.name(), report.grid.rows, report.grid.cols),
    }
    for notice in &report.notices {
        println!("NOTE: {}", notice);
    }

    println!();
    println!("Classes covering more than the dominance threshold:");
    println!(
        "{:<34} {:>12} {:>8} {:>8} {:>12}",
        "class", "area (ha)", "share %", "patches", "edge (m)"
    );
    for row in &report.dominant.rows {
        let m = &row.metrics;
        println!(
            "{:<34} {:>12.2} {:>8.2} {:>8} {:>12.1}",
            format!("{} ({})", row.label, m.class_code),
            m.total_area,
            m.proportion_of_landscape,
            m.number_of_patches,
            m.total_edge
        );
    }

    println!();
    for descriptor in METRIC_GLOSSARY.iter() {
        if descriptor.unit.is_empty() {
            println!("  {:<32} {}", descriptor.name, descriptor.description);
        } else {
            println!("  {:<32} {} ({})", descriptor.name, descriptor.description, descriptor.unit);
        }
    }
}

//! `geopyramid tile` - render one source into a tile pyramid.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use geopyramid::config::{ConfigFile, StorageConfig};
use geopyramid::dataset::DatasetKind;
use geopyramid::logging::init_logging;
use geopyramid::orchestrator::{JobReport, TilingJob, TilingOrchestrator};
use geopyramid::pyramid::LayerId;
use geopyramid::service::{JobEvent, ServiceError, TilingDaemon, TilingDaemonConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::load_config;
use crate::error::CliError;

/// Highest zoom accepted on the command line.
pub const MAX_CLI_ZOOM: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// GeoJSON, KML or shapefile features
    Vector,
    /// GeoTIFF or world-file PNG/JPEG
    Raster,
}

impl From<SourceKind> for DatasetKind {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Vector => DatasetKind::Vector,
            SourceKind::Raster => DatasetKind::Raster,
        }
    }
}

/// Arguments for `geopyramid tile`.
#[derive(Debug, Args)]
pub struct TileArgs {
    /// Declared source kind
    #[arg(long, value_enum)]
    pub kind: SourceKind,

    /// Source file
    #[arg(long)]
    pub source: PathBuf,

    /// Layer id (defaults to the source file stem)
    #[arg(long)]
    pub layer: Option<String>,

    /// Lowest zoom to render
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=MAX_CLI_ZOOM as i64))]
    pub min_zoom: Option<u8>,

    /// Highest zoom to render (detected from pixel size for rasters)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=MAX_CLI_ZOOM as i64))]
    pub max_zoom: Option<u8>,

    /// Output root, overriding [storage] tiles_dir
    #[arg(long)]
    pub tiles_dir: Option<PathBuf>,

    /// Render threads, overriding [tiling] threads (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Configuration file (defaults to ~/.geopyramid/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Everything needed to run one job, after config and flags are merged.
#[derive(Debug)]
struct TileRequest {
    storage: StorageConfig,
    threads: usize,
    job: TilingJob,
}

fn resolve(args: &TileArgs, config: &ConfigFile, cwd: &Path) -> Result<TileRequest, CliError> {
    if let (Some(min), Some(max)) = (args.min_zoom, args.max_zoom) {
        if min > max {
            return Err(CliError::InvalidZoom { min, max });
        }
    }

    let layer = match &args.layer {
        Some(id) => LayerId::new(id.clone())?,
        None => LayerId::from_source(&args.source)?,
    };

    let mut storage = config.storage();
    if let Some(dir) = &args.tiles_dir {
        storage = storage.with_tiles_root(cwd.join(dir));
    }

    // Paths on the command line are relative to where the user is, not to
    // the upload directory.
    let source = cwd.join(&args.source);
    let job = TilingJob::new(args.kind.into(), source, layer).with_zoom(args.min_zoom, args.max_zoom);

    Ok(TileRequest {
        storage,
        threads: args.threads.unwrap_or(config.tiling.threads),
        job,
    })
}

/// Run the tile command.
pub fn run(args: TileArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let cwd = std::env::current_dir().map_err(CliError::CurrentDir)?;
    let request = resolve(&args, &config, &cwd)?;

    let _logging = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let tiles_root = request.storage.tiles_root.clone();
    let orchestrator = Arc::new(TilingOrchestrator::new(request.storage, request.threads)?);
    let daemon_config = TilingDaemonConfig::default().with_max_concurrent_jobs(config.tiling.max_concurrent_jobs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    match runtime.block_on(submit_and_wait(orchestrator, daemon_config, request.job))? {
        JobEvent::Succeeded(report) => {
            print_report(&report, &tiles_root);
            Ok(())
        }
        JobEvent::Failed(failure) => Err(CliError::Job(failure)),
    }
}

async fn submit_and_wait(
    orchestrator: Arc<TilingOrchestrator>,
    config: TilingDaemonConfig,
    job: TilingJob,
) -> Result<JobEvent, CliError> {
    let (daemon, jobs, mut events) = TilingDaemon::new(orchestrator, config);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(daemon.run(shutdown.clone()));

    let layer = job.layer().clone();
    jobs.submit(job).await?;
    info!(layer = %layer, "Tiling job accepted");

    let event = events.recv().await.ok_or(ServiceError::Closed)?;
    shutdown.cancel();
    let _ = handle.await;
    Ok(event)
}

fn print_report(report: &JobReport, tiles_root: &Path) {
    let stats = &report.stats;
    println!();
    println!("Layer:     {}", report.layer);
    println!("Zoom:      {}", report.zoom);
    println!(
        "Tiles:     {} written, {} skipped, {} considered",
        stats.tiles_written,
        stats.total_skipped(),
        stats.tiles_considered
    );
    println!("Elapsed:   {:.2?}", report.elapsed);
    println!("Output:    {}", tiles_root.join(report.layer.as_str()).display());
    println!("Tile URL:  {}", report.tile_url_template());
}

//! Tiling orchestrator
//!
//! Drives one job through `Loading → Planning → Rendering → Done | Failed`.
//! Tiles of a zoom level are rendered in parallel on a dedicated rayon pool;
//! the dataset and spatial index are shared read-only across workers.
//!
//! Per-tile skips, render failures and panics are absorbed and counted in
//! [`TilingStats`]. Load failures, source pixels that cannot be decoded and
//! the first write failure end the job.

mod types;

pub use types::{
    JobErrorKind, JobFailure, JobOutcome, JobReport, JobState, OrchestratorError, RasterJob,
    TilingJob, TilingStats, VectorJob,
};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::coord::{tiles_covering, GeoBounds, TileAddress};
use crate::dataset::{Dataset, LoadError};
use crate::index::SpatialIndex;
use crate::planner::{self, ZoomRange};
use crate::pyramid::{LayerId, PyramidWriter, WriteError};
use crate::render::{RasterRenderer, SkipReason, TileRender, TileRenderer, TileStyle, VectorRenderer};
use types::StatsCounter;

/// Why rendering stopped before the last zoom level.
#[derive(Debug)]
enum RenderAbort {
    Source(LoadError),
    Write(WriteError),
}

/// Runs tiling jobs against one storage layout.
pub struct TilingOrchestrator {
    storage: StorageConfig,
    writer: PyramidWriter,
    pool: ThreadPool,
}

impl TilingOrchestrator {
    /// Creates an orchestrator with its own render pool.
    ///
    /// # Arguments
    ///
    /// * `storage` - Where sources are resolved and tiles are written
    /// * `threads` - Render worker count, 0 for one per core
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::ThreadPool` if the pool cannot be built.
    pub fn new(storage: StorageConfig, threads: usize) -> Result<Self, OrchestratorError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("geopyramid-render-{i}"))
            .build()?;
        let writer = PyramidWriter::new(storage.tiles_root.clone());
        Ok(Self {
            storage,
            writer,
            pool,
        })
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn writer(&self) -> &PyramidWriter {
        &self.writer
    }

    /// Runs a job to completion.
    ///
    /// Always returns exactly one outcome. Tiles already written before a
    /// write failure are left in place.
    pub fn run(&self, job: TilingJob) -> JobOutcome {
        let started = Instant::now();
        let layer = job.layer().clone();
        let source = self.storage.resolve_source(job.source());

        info!(
            layer = %layer,
            kind = %job.kind(),
            source = %source.display(),
            state = %JobState::Loading,
            "Tiling job started"
        );

        let dataset = Dataset::open(&source, job.kind()).map_err(|e| load_failed(&layer, &e))?;

        let index;
        let renderer: Box<dyn TileRenderer + '_> = match &dataset {
            Dataset::Vector(vector) => {
                index = SpatialIndex::build(vector);
                debug!(layer = %layer, features = index.len(), "Spatial index built");
                let style = match &job {
                    TilingJob::Vector(v) => v.style,
                    TilingJob::Raster(_) => TileStyle::default(),
                };
                Box::new(VectorRenderer::new(vector, &index, style))
            }
            Dataset::Raster(raster) => {
                Box::new(RasterRenderer::new(raster).map_err(|e| load_failed(&layer, &e))?)
            }
        };

        debug!(layer = %layer, state = %JobState::Planning, "Planning zoom range");
        let (min, max) = job.zoom_overrides();
        let zoom = planner::plan(&dataset, min, max);

        info!(layer = %layer, state = %JobState::Rendering, zoom = %zoom, "Rendering tiles");
        let stats = StatsCounter::default();
        if let Some(extent) = dataset.geographic_extent() {
            match self.render_levels(renderer.as_ref(), &layer, zoom, &extent, &stats) {
                Ok(()) => {}
                Err(RenderAbort::Source(e)) => return Err(load_failed(&layer, &e)),
                Err(RenderAbort::Write(e)) => {
                    error!(
                        layer = %layer,
                        state = %JobState::Failed,
                        path = %e.path().display(),
                        error = %e,
                        "Tiling job failed while writing"
                    );
                    return Err(JobFailure::write(layer, &e));
                }
            }
        } else {
            debug!(layer = %layer, "Dataset has no extent, nothing to render");
        }

        let stats = stats.snapshot();
        let elapsed = started.elapsed();
        info!(
            layer = %layer,
            state = %JobState::Done,
            considered = stats.tiles_considered,
            written = stats.tiles_written,
            skipped = stats.total_skipped(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Tiling job complete"
        );

        Ok(JobReport {
            layer,
            zoom,
            stats,
            elapsed,
        })
    }

    fn render_levels<R: TileRenderer + ?Sized>(
        &self,
        renderer: &R,
        layer: &LayerId,
        zoom: ZoomRange,
        extent: &GeoBounds,
        stats: &StatsCounter,
    ) -> Result<(), RenderAbort> {
        for z in zoom.levels() {
            let range = tiles_covering(extent, z);
            if range.is_empty() {
                continue;
            }

            let level_start = Instant::now();
            debug!(layer = %layer, zoom = z, tiles = range.len(), "Rendering zoom level");

            self.pool.install(|| {
                range
                    .iter()
                    .par_bridge()
                    .try_for_each(|addr| self.render_tile(renderer, layer, &addr, stats))
            })?;

            info!(
                layer = %layer,
                zoom = z,
                tiles = range.len(),
                elapsed_ms = level_start.elapsed().as_millis() as u64,
                "Zoom level complete"
            );
        }
        Ok(())
    }

    fn render_tile<R: TileRenderer + ?Sized>(
        &self,
        renderer: &R,
        layer: &LayerId,
        addr: &TileAddress,
        stats: &StatsCounter,
    ) -> Result<(), RenderAbort> {
        stats.considered();

        match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(addr))) {
            Ok(TileRender::Rendered(image)) => {
                self.writer.write(layer, addr, &image).map_err(RenderAbort::Write)?;
                stats.written();
            }
            Ok(TileRender::Unreadable(e)) => {
                warn!(tile = %addr, error = %e, "Source pixels unreadable, stopping job");
                return Err(RenderAbort::Source(e));
            }
            Ok(TileRender::Skipped(reason)) => {
                debug!(tile = %addr, reason = %reason, "Tile skipped");
                stats.skipped(reason);
            }
            Ok(TileRender::Failed(detail)) => {
                warn!(tile = %addr, error = %detail, "Tile render failed, skipping");
                stats.failed();
            }
            Err(payload) => {
                warn!(
                    tile = %addr,
                    panic = %panic_message(payload.as_ref()),
                    "Tile renderer panicked, skipping"
                );
                stats.skipped(SkipReason::Panicked);
            }
        }
        Ok(())
    }
}

fn load_failed(layer: &LayerId, e: &LoadError) -> JobFailure {
    error!(
        layer = %layer,
        state = %JobState::Failed,
        kind = e.kind(),
        error = %e,
        "Tiling job failed while loading"
    );
    JobFailure::load(layer.clone(), e)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

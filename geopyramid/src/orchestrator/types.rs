//! Job descriptions, outcomes and statistics.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::dataset::{DatasetKind, LoadError};
use crate::planner::ZoomRange;
use crate::pyramid::{LayerId, WriteError};
use crate::render::{SkipReason, TileStyle};

/// Tiles a vector source.
#[derive(Debug, Clone)]
pub struct VectorJob {
    pub source: PathBuf,
    pub layer: LayerId,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub style: TileStyle,
}

impl VectorJob {
    pub fn new(source: impl Into<PathBuf>, layer: LayerId) -> Self {
        Self {
            source: source.into(),
            layer,
            min_zoom: None,
            max_zoom: None,
            style: TileStyle::default(),
        }
    }

    pub fn with_zoom(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    pub fn with_style(mut self, style: TileStyle) -> Self {
        self.style = style;
        self
    }
}

/// Tiles a raster source.
#[derive(Debug, Clone)]
pub struct RasterJob {
    pub source: PathBuf,
    pub layer: LayerId,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
}

impl RasterJob {
    pub fn new(source: impl Into<PathBuf>, layer: LayerId) -> Self {
        Self {
            source: source.into(),
            layer,
            min_zoom: None,
            max_zoom: None,
        }
    }

    pub fn with_zoom(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }
}

/// One unit of tiling work.
#[derive(Debug, Clone)]
pub enum TilingJob {
    Vector(VectorJob),
    Raster(RasterJob),
}

impl TilingJob {
    /// Builds a job of the declared kind with default options.
    pub fn new(kind: DatasetKind, source: impl Into<PathBuf>, layer: LayerId) -> Self {
        match kind {
            DatasetKind::Vector => TilingJob::Vector(VectorJob::new(source, layer)),
            DatasetKind::Raster => TilingJob::Raster(RasterJob::new(source, layer)),
        }
    }

    pub fn with_zoom(self, min: Option<u8>, max: Option<u8>) -> Self {
        match self {
            TilingJob::Vector(j) => TilingJob::Vector(j.with_zoom(min, max)),
            TilingJob::Raster(j) => TilingJob::Raster(j.with_zoom(min, max)),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            TilingJob::Vector(_) => DatasetKind::Vector,
            TilingJob::Raster(_) => DatasetKind::Raster,
        }
    }

    pub fn layer(&self) -> &LayerId {
        match self {
            TilingJob::Vector(j) => &j.layer,
            TilingJob::Raster(j) => &j.layer,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            TilingJob::Vector(j) => &j.source,
            TilingJob::Raster(j) => &j.source,
        }
    }

    pub fn zoom_overrides(&self) -> (Option<u8>, Option<u8>) {
        match self {
            TilingJob::Vector(j) => (j.min_zoom, j.max_zoom),
            TilingJob::Raster(j) => (j.min_zoom, j.max_zoom),
        }
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Loading,
    Planning,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Loading => "loading",
            JobState::Planning => "planning",
            JobState::Rendering => "rendering",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Counts of what happened to every tile a job considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TilingStats {
    pub tiles_considered: u64,
    pub tiles_written: u64,
    pub skipped_no_features: u64,
    pub skipped_outside_source: u64,
    pub skipped_all_nodata: u64,
    pub skipped_degenerate: u64,
    pub skipped_panicked: u64,
    /// Tiles whose render failed locally (transform or decode errors)
    pub tiles_failed: u64,
}

impl TilingStats {
    pub fn skipped(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::NoFeatures => self.skipped_no_features,
            SkipReason::OutsideSource => self.skipped_outside_source,
            SkipReason::AllNoData => self.skipped_all_nodata,
            SkipReason::Degenerate => self.skipped_degenerate,
            SkipReason::Panicked => self.skipped_panicked,
        }
    }

    /// Tiles considered but not written, for any reason.
    pub fn total_skipped(&self) -> u64 {
        self.tiles_considered - self.tiles_written
    }
}

/// Thread-safe accumulator behind [`TilingStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    considered: AtomicU64,
    written: AtomicU64,
    no_features: AtomicU64,
    outside_source: AtomicU64,
    all_nodata: AtomicU64,
    degenerate: AtomicU64,
    panicked: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounter {
    pub fn considered(&self) {
        self.considered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::NoFeatures => &self.no_features,
            SkipReason::OutsideSource => &self.outside_source,
            SkipReason::AllNoData => &self.all_nodata,
            SkipReason::Degenerate => &self.degenerate,
            SkipReason::Panicked => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TilingStats {
        TilingStats {
            tiles_considered: self.considered.load(Ordering::Relaxed),
            tiles_written: self.written.load(Ordering::Relaxed),
            skipped_no_features: self.no_features.load(Ordering::Relaxed),
            skipped_outside_source: self.outside_source.load(Ordering::Relaxed),
            skipped_all_nodata: self.all_nodata.load(Ordering::Relaxed),
            skipped_degenerate: self.degenerate.load(Ordering::Relaxed),
            skipped_panicked: self.panicked.load(Ordering::Relaxed),
            tiles_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Successful job outcome.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub layer: LayerId,
    pub zoom: ZoomRange,
    pub stats: TilingStats,
    pub elapsed: Duration,
}

impl JobReport {
    /// URL template a map client uses to fetch this layer's tiles.
    pub fn tile_url_template(&self) -> String {
        format!("/tiles/{}/{{z}}/{{x}}/{{y}}.png", self.layer)
    }
}

/// Category of a terminal job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    Load,
    Write,
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobErrorKind::Load => f.write_str("load"),
            JobErrorKind::Write => f.write_str("write"),
        }
    }
}

/// Failed job outcome.
#[derive(Debug, Clone, Error)]
#[error("Tiling layer '{layer}' failed ({kind}): {detail}")]
pub struct JobFailure {
    pub layer: LayerId,
    pub kind: JobErrorKind,
    pub detail: String,
}

impl JobFailure {
    pub(crate) fn load(layer: LayerId, error: &LoadError) -> Self {
        Self {
            layer,
            kind: JobErrorKind::Load,
            detail: error.to_string(),
        }
    }

    pub(crate) fn write(layer: LayerId, error: &WriteError) -> Self {
        Self {
            layer,
            kind: JobErrorKind::Write,
            detail: error.to_string(),
        }
    }
}

/// Exactly one per job.
pub type JobOutcome = Result<JobReport, JobFailure>;

/// Errors constructing an orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to build tiling thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> LayerId {
        LayerId::new("parcels").unwrap()
    }

    #[test]
    fn test_tile_url_template() {
        let report = JobReport {
            layer: layer(),
            zoom: ZoomRange::new(0, 3),
            stats: TilingStats::default(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.tile_url_template(), "/tiles/parcels/{z}/{x}/{y}.png");
    }

    #[test]
    fn test_job_accessors() {
        let job = TilingJob::new(DatasetKind::Raster, "/data/dem.tif", layer()).with_zoom(Some(2), None);
        assert_eq!(job.kind(), DatasetKind::Raster);
        assert_eq!(job.layer().as_str(), "parcels");
        assert_eq!(job.source(), Path::new("/data/dem.tif"));
        assert_eq!(job.zoom_overrides(), (Some(2), None));
    }

    #[test]
    fn test_stats_counter_snapshot() {
        let counter = StatsCounter::default();
        for _ in 0..3 {
            counter.considered();
        }
        counter.written();
        counter.skipped(SkipReason::NoFeatures);
        counter.skipped(SkipReason::Panicked);

        let stats = counter.snapshot();
        assert_eq!(stats.tiles_considered, 3);
        assert_eq!(stats.tiles_written, 1);
        assert_eq!(stats.skipped(SkipReason::NoFeatures), 1);
        assert_eq!(stats.skipped(SkipReason::Panicked), 1);
        assert_eq!(stats.total_skipped(), 2);
    }

    #[test]
    fn test_failure_display() {
        let failure = JobFailure {
            layer: layer(),
            kind: JobErrorKind::Load,
            detail: "bad file".to_string(),
        };
        assert_eq!(failure.to_string(), "Tiling layer 'parcels' failed (load): bad file");
    }
}

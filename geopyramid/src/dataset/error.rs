//! Load-stage errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::projection::ProjectionError;

/// Errors that prevent a dataset from being opened.
///
/// Any of these terminates the job before a single tile is rendered.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported {kind} format: {path}")]
    UnsupportedFormat { kind: &'static str, path: PathBuf },

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("No coordinate reference system found for {path}")]
    MissingCrs { path: PathBuf },

    #[error("No georeferencing found for {path}")]
    MissingGeoreference { path: PathBuf },

    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    #[error("Reprojection failed: {0}")]
    Reprojection(#[from] ProjectionError),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        LoadError::Parse {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Short, stable name of the error kind for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Io { .. } => "io",
            LoadError::UnsupportedFormat { .. } => "unsupported_format",
            LoadError::Parse { .. } => "parse",
            LoadError::MissingCrs { .. } => "missing_crs",
            LoadError::MissingGeoreference { .. } => "missing_georeference",
            LoadError::UnsupportedCrs(_) => "unsupported_crs",
            LoadError::UnsupportedLayout(_) => "unsupported_layout",
            LoadError::Reprojection(_) => "reprojection",
        }
    }
}

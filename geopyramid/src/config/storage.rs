//! Storage layout passed explicitly into the orchestrator.

use std::path::{Path, PathBuf};

/// Where sources are read from and tiles are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Base directory for relative source paths
    pub upload_root: PathBuf,
    /// Root of every layer's pyramid
    pub tiles_root: PathBuf,
}

impl StorageConfig {
    pub fn new(upload_root: impl Into<PathBuf>, tiles_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            tiles_root: tiles_root.into(),
        }
    }

    pub fn with_upload_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.upload_root = root.into();
        self
    }

    pub fn with_tiles_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tiles_root = root.into();
        self
    }

    /// Absolute paths are used as given; relative ones live under `upload_root`.
    pub fn resolve_source(&self, source: &Path) -> PathBuf {
        if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.upload_root.join(source)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = super::config_directory();
        Self::new(base.join("uploads"), base.join("tiles"))
    }
}

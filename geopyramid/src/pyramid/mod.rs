//! Pyramid writer
//!
//! Persists rendered tiles as `root/{layer_id}/{z}/{x}/{y}.png`. Directory
//! creation is idempotent and safe under concurrent creators. Each tile is
//! written to a temporary sibling and renamed into place, so readers never
//! observe a partial PNG and the last writer wins.

use std::fmt;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::ImageFormat;
use thiserror::Error;
use tracing::trace;

use crate::coord::TileAddress;
use crate::render::TileImage;

/// Errors that abort a job while persisting a tile.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode tile {path}: {detail}")]
    Encode { path: PathBuf, detail: String },

    #[error("Failed to write tile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    pub fn path(&self) -> &Path {
        match self {
            WriteError::CreateDir { path, .. }
            | WriteError::Encode { path, .. }
            | WriteError::Write { path, .. } => path,
        }
    }
}

/// A layer id that is not a single safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid layer id '{0}': must be a non-empty name without path separators")]
pub struct InvalidLayerId(pub String);

/// Name of one job's output subtree; a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(String);

impl LayerId {
    /// Validates a layer id.
    ///
    /// Rejects empty ids, `.` and `..`, and anything containing `/`, `\` or NUL.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidLayerId> {
        let id = id.into();
        let bad = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0'])
            || id.trim() != id;
        if bad {
            return Err(InvalidLayerId(id));
        }
        Ok(Self(id))
    }

    /// Derives a layer id from a source file stem.
    pub fn from_source(path: &Path) -> Result<Self, InvalidLayerId> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LayerId {
    type Err = InvalidLayerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes tiles beneath a root directory.
#[derive(Debug, Clone)]
pub struct PyramidWriter {
    root: PathBuf,
}

impl PyramidWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every tile of a layer.
    pub fn layer_dir(&self, layer: &LayerId) -> PathBuf {
        self.root.join(layer.as_str())
    }

    /// Deterministic location of a tile.
    pub fn tile_path(&self, layer: &LayerId, addr: &TileAddress) -> PathBuf {
        self.layer_dir(layer)
            .join(addr.z().to_string())
            .join(addr.x().to_string())
            .join(format!("{}.png", addr.y()))
    }

    /// Encodes and stores one tile, returning its path.
    ///
    /// # Errors
    ///
    /// `CreateDir` when the column directory cannot be created, `Encode` when
    /// PNG encoding fails and `Write` for any file-system failure while
    /// storing the bytes.
    pub fn write(&self, layer: &LayerId, addr: &TileAddress, image: &TileImage) -> Result<PathBuf, WriteError> {
        let path = self.tile_path(layer, addr);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());

        // create_dir_all treats an existing directory as success, including
        // one created concurrently by another worker.
        fs::create_dir_all(&dir).map_err(|e| WriteError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;

        let mut png = Cursor::new(Vec::new());
        image
            .as_image()
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| WriteError::Encode {
                path: path.clone(),
                detail: e.to_string(),
            })?;

        let temp = dir.join(format!(
            ".{}.png.{}.{}",
            addr.y(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, png.into_inner()).map_err(|e| WriteError::Write {
            path: temp.clone(),
            source: e,
        })?;
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(WriteError::Write { path, source: e });
        }

        trace!(path = %path.display(), "Wrote tile");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TILE_SIZE;
    use tempfile::TempDir;

    fn image(value: u8) -> TileImage {
        TileImage::from_raw(1, vec![value; (TILE_SIZE * TILE_SIZE) as usize]).unwrap()
    }

    #[test]
    fn test_layer_id_validation() {
        assert!(LayerId::new("roads").is_ok());
        assert!(LayerId::new("roads.v2").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", " padded"] {
            assert!(LayerId::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_layer_id_from_source_stem() {
        let id = LayerId::from_source(Path::new("/uploads/parcels.geojson")).unwrap();
        assert_eq!(id.as_str(), "parcels");
        assert!(LayerId::from_source(Path::new("/")).is_err());
    }

    #[test]
    fn test_tile_path_layout() {
        let writer = PyramidWriter::new("/tiles");
        let layer = LayerId::new("dem").unwrap();
        let addr = TileAddress::new(5, 17, 11).unwrap();
        assert_eq!(writer.tile_path(&layer, &addr), PathBuf::from("/tiles/dem/5/17/11.png"));
    }

    #[test]
    fn test_write_creates_png() {
        let temp = TempDir::new().unwrap();
        let writer = PyramidWriter::new(temp.path());
        let layer = LayerId::new("layer").unwrap();
        let addr = TileAddress::new(2, 1, 3).unwrap();

        let path = writer.write(&layer, &addr, &image(9)).unwrap();
        assert_eq!(path, temp.path().join("layer/2/1/3.png"));

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), TILE_SIZE);
        assert_eq!(decoded.to_luma8().get_pixel(0, 0).0, [9]);
    }

    #[test]
    fn test_rewrite_last_wins_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let writer = PyramidWriter::new(temp.path());
        let layer = LayerId::new("layer").unwrap();
        let addr = TileAddress::new(1, 0, 0).unwrap();

        writer.write(&layer, &addr, &image(1)).unwrap();
        let path = writer.write(&layer, &addr, &image(2)).unwrap();

        assert_eq!(image::open(&path).unwrap().to_luma8().get_pixel(5, 5).0, [2]);
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_unwritable_root_is_create_dir_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let writer = PyramidWriter::new(&blocker);
        let layer = LayerId::new("layer").unwrap();
        let err = writer
            .write(&layer, &TileAddress::new(0, 0, 0).unwrap(), &image(1))
            .unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }
}

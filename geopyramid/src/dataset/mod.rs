//! Dataset loading
//!
//! A dataset is either an ordered vector feature collection or a raster
//! grid. Loading normalizes vectors to web-mercator and reads raster
//! metadata; both expose their footprint in geographic degrees so the
//! orchestrator can enumerate covering tiles.
//!
//! # Supported formats
//!
//! | Kind   | Extensions            |
//! |--------|-----------------------|
//! | vector | `.geojson`, `.json`, `.shp` with `.shx` and `.prj`, `.kml` |
//! | raster | `.tif`, `.tiff`, `.png`/`.jpg`/`.jpeg` with world file and `.prj` |

mod error;
mod geotiff;
mod prj;
mod raster;
mod vector;
mod world_file;

pub use error::LoadError;
pub use raster::{
    GeoTransform, PixelWindow, RasterDataset, RasterFormat, RasterSamples, RasterWindow, SampleBuffer,
    SampleType, MAX_CHUNK_BYTES, MAX_WHOLE_IMAGE_BYTES, METERS_PER_DEGREE,
};
pub use vector::{VectorDataset, VectorFeature, VectorFormat};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::coord::GeoBounds;

/// Declared kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Vector,
    Raster,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Vector => "vector",
            DatasetKind::Raster => "raster",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(DatasetKind::Vector),
            "raster" => Ok(DatasetKind::Raster),
            other => Err(format!("unknown dataset kind '{}' (expected vector or raster)", other)),
        }
    }
}

/// A loaded source dataset.
#[derive(Debug)]
pub enum Dataset {
    Vector(VectorDataset),
    Raster(RasterDataset),
}

impl Dataset {
    /// Loads `path` as the declared kind.
    pub fn open(path: &Path, kind: DatasetKind) -> Result<Self, LoadError> {
        match kind {
            DatasetKind::Vector => VectorDataset::open(path).map(Dataset::Vector),
            DatasetKind::Raster => RasterDataset::open(path).map(Dataset::Raster),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            Dataset::Vector(_) => DatasetKind::Vector,
            Dataset::Raster(_) => DatasetKind::Raster,
        }
    }

    /// Footprint in longitude/latitude degrees, `None` for a vector dataset
    /// without any geometry.
    pub fn geographic_extent(&self) -> Option<GeoBounds> {
        match self {
            Dataset::Vector(v) => v.geographic_extent(),
            Dataset::Raster(r) => Some(r.geographic_extent()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("vector".parse::<DatasetKind>().unwrap(), DatasetKind::Vector);
        assert_eq!(" Raster ".parse::<DatasetKind>().unwrap(), DatasetKind::Raster);
        assert!("mesh".parse::<DatasetKind>().is_err());
        assert_eq!(DatasetKind::Raster.to_string(), "raster");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Dataset::open(Path::new("/nonexistent/roads.geojson"), DatasetKind::Vector).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}

//! Tile rendering
//!
//! Two strategies turn a tile address into a 256×256 image: vector
//! rasterization with `tiny-skia` and raster reprojection with bilinear
//! resampling. Both implement [`TileRenderer`] and report a [`TileRender`]
//! outcome. Per-tile conditions never escape as errors; only source data
//! that cannot be decoded at all is reported as [`TileRender::Unreadable`].

mod raster;
mod resample;
mod vector;

pub use raster::RasterRenderer;
pub use vector::VectorRenderer;

use std::fmt;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use tiny_skia::Pixmap;

use crate::coord::{TileAddress, TILE_SIZE};
use crate::dataset::LoadError;

/// Why a tile produced no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No feature intersects the tile
    NoFeatures,
    /// The tile lies outside the raster footprint
    OutsideSource,
    /// Every output sample was zero
    AllNoData,
    /// Intersecting data produced nothing drawable, for example a
    /// zero-area polygon. No tile is written instead of a fully transparent
    /// one, so a missing tile keeps meaning "no data there".
    Degenerate,
    /// The renderer panicked; the panic was contained
    Panicked,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoFeatures => "no_features",
            SkipReason::OutsideSource => "outside_source",
            SkipReason::AllNoData => "all_nodata",
            SkipReason::Degenerate => "degenerate",
            SkipReason::Panicked => "panicked",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of rendering one tile.
#[derive(Debug)]
pub enum TileRender {
    Rendered(TileImage),
    Skipped(SkipReason),
    /// A transform failure local to this tile
    Failed(String),
    /// The source pixels could not be decoded; ends the job
    Unreadable(LoadError),
}

/// A finished 256×256, 8-bit tile image with 1 to 4 channels.
#[derive(Debug, Clone)]
pub struct TileImage {
    image: DynamicImage,
}

impl TileImage {
    /// Wraps interleaved 8-bit samples with `channels` per pixel.
    ///
    /// Returns `None` unless `channels` is 1..=4 and the buffer holds exactly
    /// one tile.
    pub fn from_raw(channels: usize, data: Vec<u8>) -> Option<Self> {
        let (w, h) = (TILE_SIZE, TILE_SIZE);
        let image = match channels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data)?),
            2 => DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, data)?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data)?),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, data)?),
            _ => return None,
        };
        Some(Self { image })
    }

    /// Converts a premultiplied `tiny-skia` canvas to straight RGBA.
    pub fn from_pixmap(pixmap: &Pixmap) -> Option<Self> {
        if pixmap.width() != TILE_SIZE || pixmap.height() != TILE_SIZE {
            return None;
        }
        let data = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Self::from_raw(4, data)
    }

    pub fn channels(&self) -> usize {
        usize::from(self.image.color().channel_count())
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    /// Raw interleaved bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }
}

/// Renders one tile of a dataset.
///
/// Implementations are shared across worker threads and must be pure
/// functions of the address.
pub trait TileRenderer: Sync {
    fn render(&self, addr: &TileAddress) -> TileRender;
}

/// Fixed single-style colours for vector rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileStyle {
    /// RGBA fill for polygons and points; stroke colour for lines
    pub fill: [u8; 4],
    /// RGBA outline for polygons and points
    pub outline: [u8; 4],
    pub outline_width: f32,
    pub point_radius: f32,
}

impl Default for TileStyle {
    fn default() -> Self {
        Self {
            fill: [0xFF, 0x00, 0x00, 0xFF],
            outline: [0x00, 0x00, 0x00, 0xFF],
            outline_width: 1.0,
            point_radius: 3.0,
        }
    }
}

impl TileStyle {
    pub fn with_fill(mut self, rgba: [u8; 4]) -> Self {
        self.fill = rgba;
        self
    }

    pub fn with_outline(mut self, rgba: [u8; 4]) -> Self {
        self.outline = rgba;
        self
    }
}

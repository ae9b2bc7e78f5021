//! Raster datasets.
//!
//! Opening a raster reads only its metadata: dimensions, band layout,
//! georeferencing and CRS. GeoTIFF pixels are read per tile, window by
//! window. PNG/JPEG images have no chunked decoder, so they are decoded
//! whole on first use and then shared read-only by every worker.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use geo::Rect;
use tracing::{debug, info};

use super::geotiff::{self, ChunkLayout};
use super::{world_file, LoadError};
use crate::coord::{BoundsCrs, GeoBounds};
use crate::projection::Crs;

/// Meters per degree of longitude at the equator.
pub const METERS_PER_DEGREE: f64 = 111_319.490_793_273_57;

/// Largest single GeoTIFF strip or tile that will be decoded.
pub const MAX_CHUNK_BYTES: u64 = 128 * 1024 * 1024;

/// Largest PNG/JPEG raster, decoded size, that will be opened.
pub const MAX_WHOLE_IMAGE_BYTES: u64 = 256 * 1024 * 1024;

/// Points sampled along each raster edge when computing its geographic extent.
const EDGE_SAMPLES: usize = 21;

/// Affine pixel-to-CRS transform, in GDAL coefficient order.
///
/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// North-up grid of `width × height` pixels exactly covering `bounds`.
    pub fn for_bounds(bounds: &GeoBounds, width: u32, height: u32) -> Self {
        Self {
            origin_x: bounds.minx,
            pixel_width: bounds.width() / f64::from(width),
            row_rotation: 0.0,
            origin_y: bounds.maxy,
            col_rotation: 0.0,
            pixel_height: -bounds.height() / f64::from(height),
        }
    }

    /// Maps a (fractional) pixel position to CRS coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Inverse transform, `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(GeoTransform {
            origin_x: (self.row_rotation * self.origin_y - self.origin_x * self.pixel_height) / det,
            pixel_width: self.pixel_height / det,
            row_rotation: -self.row_rotation / det,
            origin_y: (self.origin_x * self.col_rotation - self.pixel_width * self.origin_y) / det,
            col_rotation: -self.col_rotation / det,
            pixel_height: self.pixel_width / det,
        })
    }

    /// Smallest ground dimension of one pixel, in CRS units.
    pub fn pixel_size(&self) -> f64 {
        let along_row = self.pixel_width.hypot(self.col_rotation);
        let along_col = self.row_rotation.hypot(self.pixel_height);
        along_row.min(along_col)
    }
}

/// Numeric type of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Bytes per sample.
    pub fn size_bytes(&self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::U64 | SampleType::I64 | SampleType::F64 => 8,
        }
    }
}

/// Decoded pixel samples, band-interleaved, row-major.
#[derive(Debug, Clone)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleBuffer {
    /// `len` zero samples of type `ty`.
    pub fn zeroed(ty: SampleType, len: usize) -> Self {
        match ty {
            SampleType::U8 => SampleBuffer::U8(vec![0; len]),
            SampleType::U16 => SampleBuffer::U16(vec![0; len]),
            SampleType::U32 => SampleBuffer::U32(vec![0; len]),
            SampleType::U64 => SampleBuffer::U64(vec![0; len]),
            SampleType::I8 => SampleBuffer::I8(vec![0; len]),
            SampleType::I16 => SampleBuffer::I16(vec![0; len]),
            SampleType::I32 => SampleBuffer::I32(vec![0; len]),
            SampleType::I64 => SampleBuffer::I64(vec![0; len]),
            SampleType::F32 => SampleBuffer::F32(vec![0.0; len]),
            SampleType::F64 => SampleBuffer::F64(vec![0.0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::U8(v) => v.len(),
            SampleBuffer::U16(v) => v.len(),
            SampleBuffer::U32(v) => v.len(),
            SampleBuffer::U64(v) => v.len(),
            SampleBuffer::I8(v) => v.len(),
            SampleBuffer::I16(v) => v.len(),
            SampleBuffer::I32(v) => v.len(),
            SampleBuffer::I64(v) => v.len(),
            SampleBuffer::F32(v) => v.len(),
            SampleBuffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn value(&self, index: usize) -> f64 {
        match self {
            SampleBuffer::U8(v) => f64::from(v[index]),
            SampleBuffer::U16(v) => f64::from(v[index]),
            SampleBuffer::U32(v) => f64::from(v[index]),
            SampleBuffer::U64(v) => v[index] as f64,
            SampleBuffer::I8(v) => f64::from(v[index]),
            SampleBuffer::I16(v) => f64::from(v[index]),
            SampleBuffer::I32(v) => f64::from(v[index]),
            SampleBuffer::I64(v) => v[index] as f64,
            SampleBuffer::F32(v) => f64::from(v[index]),
            SampleBuffer::F64(v) => v[index],
        }
    }
}

/// Pixel grid of a raster with its band layout.
#[derive(Debug, Clone)]
pub struct RasterSamples {
    width: u32,
    height: u32,
    bands: usize,
    buffer: SampleBuffer,
}

impl RasterSamples {
    /// Wraps a decoded buffer, checking it matches the declared layout.
    pub fn new(width: u32, height: u32, bands: usize, buffer: SampleBuffer) -> Result<Self, String> {
        let expected = width as usize * height as usize * bands;
        if buffer.len() != expected {
            return Err(format!(
                "expected {expected} samples for {width}x{height}x{bands}, decoded {}",
                buffer.len()
            ));
        }
        Ok(Self {
            width,
            height,
            bands,
            buffer,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Sample at integer pixel `(col, row)`, `None` outside the grid.
    #[inline]
    pub fn get(&self, band: usize, col: i64, row: i64) -> Option<f64> {
        if col < 0 || row < 0 || col >= i64::from(self.width) || row >= i64::from(self.height) || band >= self.bands {
            return None;
        }
        let index = (row as usize * self.width as usize + col as usize) * self.bands + band;
        Some(self.buffer.value(index))
    }
}

/// Half-open rectangle of source pixels, `[col0, col1) × [row0, row1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col0: u32,
    pub row0: u32,
    pub col1: u32,
    pub row1: u32,
}

impl PixelWindow {
    pub fn new(col0: u32, row0: u32, col1: u32, row1: u32) -> Self {
        Self { col0, row0, col1, row1 }
    }

    pub fn width(&self) -> u32 {
        self.col1.saturating_sub(self.col0)
    }

    pub fn height(&self) -> u32 {
        self.row1.saturating_sub(self.row0)
    }
}

/// Samples read for one window.
///
/// Sample `(i, j)` holds source pixel `(col0 + i * step, row0 + j * step)`.
#[derive(Debug)]
pub struct RasterWindow<'a> {
    col0: u32,
    row0: u32,
    step: u32,
    samples: Cow<'a, RasterSamples>,
}

impl RasterWindow<'_> {
    pub fn samples(&self) -> &RasterSamples {
        &self.samples
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Maps a fractional source pixel position into window sample space,
    /// keeping pixel centres on pixel centres.
    pub fn to_window(&self, col: f64, row: f64) -> (f64, f64) {
        let step = f64::from(self.step);
        (
            (col - f64::from(self.col0) - 0.5) / step + 0.5,
            (row - f64::from(self.row0) - 0.5) / step + 0.5,
        )
    }
}

/// Container format a raster was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    GeoTiff,
    /// PNG or JPEG with a world file and `.prj`
    WorldImage,
    /// Samples supplied directly by the caller
    Memory,
}

/// Header information shared by every raster reader.
#[derive(Debug, Clone)]
pub(crate) struct RasterMetadata {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub sample_type: SampleType,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f64>,
}

/// How pixel samples are obtained.
#[derive(Debug)]
enum PixelSource {
    /// GeoTIFF strips or tiles, read per window
    Chunked(ChunkLayout),
    /// Whole image, decoded once
    Whole(OnceLock<Result<RasterSamples, String>>),
}

/// A georeferenced pixel grid.
#[derive(Debug)]
pub struct RasterDataset {
    path: PathBuf,
    format: RasterFormat,
    meta: RasterMetadata,
    source_extent: Rect<f64>,
    geographic_extent: GeoBounds,
    pixels: PixelSource,
}

impl RasterDataset {
    /// Opens a raster, reading metadata only.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for extensions other than GeoTIFF, PNG and JPEG;
    /// `MissingCrs` / `MissingGeoreference` when the file carries no usable
    /// georeferencing; `Parse` for unreadable headers; `UnsupportedLayout`
    /// when a GeoTIFF chunk or a whole PNG/JPEG exceeds the decode limits.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let (format, meta, pixels) = match ext.as_deref() {
            Some("tif") | Some("tiff") => {
                let (meta, layout) = geotiff::read_metadata(path)?;
                (RasterFormat::GeoTiff, meta, PixelSource::Chunked(layout))
            }
            Some("png") | Some("jpg") | Some("jpeg") => {
                let meta = world_file::read_metadata(path)?;
                let decoded = u64::from(meta.width)
                    * u64::from(meta.height)
                    * meta.bands as u64
                    * meta.sample_type.size_bytes() as u64;
                if decoded > MAX_WHOLE_IMAGE_BYTES {
                    return Err(LoadError::UnsupportedLayout(format!(
                        "{}x{} image needs {} MiB decoded, limit is {} MiB; convert it to a tiled GeoTIFF",
                        meta.width,
                        meta.height,
                        decoded >> 20,
                        MAX_WHOLE_IMAGE_BYTES >> 20
                    )));
                }
                (RasterFormat::WorldImage, meta, PixelSource::Whole(OnceLock::new()))
            }
            _ => {
                return Err(LoadError::UnsupportedFormat {
                    kind: "raster",
                    path: path.to_path_buf(),
                })
            }
        };

        let dataset = Self::assemble(path.to_path_buf(), format, meta, pixels)?;
        info!(
            path = %path.display(),
            width = dataset.width(),
            height = dataset.height(),
            bands = dataset.band_count(),
            crs = %dataset.crs(),
            "Opened raster"
        );
        Ok(dataset)
    }

    /// Builds a raster from samples already in memory.
    pub fn from_samples(
        samples: RasterSamples,
        sample_type: SampleType,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
    ) -> Result<Self, LoadError> {
        let meta = RasterMetadata {
            width: samples.width,
            height: samples.height,
            bands: samples.bands,
            sample_type,
            transform,
            crs,
            nodata,
        };
        Self::assemble(
            PathBuf::from("<memory>"),
            RasterFormat::Memory,
            meta,
            PixelSource::Whole(OnceLock::from(Ok(samples))),
        )
    }

    fn assemble(
        path: PathBuf,
        format: RasterFormat,
        meta: RasterMetadata,
        pixels: PixelSource,
    ) -> Result<Self, LoadError> {
        if meta.width == 0 || meta.height == 0 || meta.bands == 0 {
            return Err(LoadError::UnsupportedLayout(format!(
                "empty raster {}x{} with {} bands",
                meta.width, meta.height, meta.bands
            )));
        }
        if meta.transform.inverse().is_none() {
            return Err(LoadError::UnsupportedLayout("singular geotransform".to_string()));
        }

        let (w, h) = (f64::from(meta.width), f64::from(meta.height));
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(c, r)| meta.transform.apply(c, r));
        let (minx, maxx) = corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.0), hi.max(p.0))
        });
        let (miny, maxy) = corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });
        let source_extent = Rect::new((minx, miny), (maxx, maxy));
        let geographic_extent = geographic_footprint(&meta)?;

        Ok(Self {
            path,
            format,
            meta,
            source_extent,
            geographic_extent,
            pixels,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn band_count(&self) -> usize {
        self.meta.bands
    }

    pub fn sample_type(&self) -> SampleType {
        self.meta.sample_type
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.meta.transform
    }

    pub fn crs(&self) -> &Crs {
        &self.meta.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.meta.nodata
    }

    /// Axis-aligned extent in the source CRS.
    pub fn source_extent(&self) -> Rect<f64> {
        self.source_extent
    }

    /// Extent in longitude/latitude degrees.
    pub fn geographic_extent(&self) -> GeoBounds {
        self.geographic_extent
    }

    /// Smallest pixel dimension in meters; degrees are converted at the equator.
    pub fn pixel_size_meters(&self) -> f64 {
        let size = self.meta.transform.pixel_size();
        if self.meta.crs.is_geographic() {
            size * METERS_PER_DEGREE
        } else {
            size
        }
    }

    /// Source pixels under `area` (source CRS), grown by `pad` pixels on
    /// every side and clamped to the grid. `None` when nothing remains.
    pub fn pixel_window(&self, area: &Rect<f64>, pad: u32) -> Option<PixelWindow> {
        let inverse = self.meta.transform.inverse()?;
        let (lo, hi) = (area.min(), area.max());
        let corners = [(lo.x, lo.y), (hi.x, lo.y), (lo.x, hi.y), (hi.x, hi.y)].map(|(x, y)| inverse.apply(x, y));

        let (mut c_lo, mut c_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut r_lo, mut r_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for (c, r) in corners {
            c_lo = c_lo.min(c);
            c_hi = c_hi.max(c);
            r_lo = r_lo.min(r);
            r_hi = r_hi.max(r);
        }

        let pad = f64::from(pad);
        let clamp = |v: f64, max: u32| if v.is_finite() { v.clamp(0.0, f64::from(max)) as u32 } else { 0 };
        let window = PixelWindow::new(
            clamp((c_lo - pad).floor(), self.meta.width),
            clamp((r_lo - pad).floor(), self.meta.height),
            clamp((c_hi + pad).ceil(), self.meta.width),
            clamp((r_hi + pad).ceil(), self.meta.height),
        );
        (window.width() > 0 && window.height() > 0).then_some(window)
    }

    /// Reads every `step`-th pixel of `window`.
    ///
    /// Rasters decoded whole return all of their samples at step 1,
    /// whatever window is asked for.
    ///
    /// # Errors
    ///
    /// `Parse` when the pixel data cannot be decoded; the file body is
    /// corrupt and no other window can be trusted either.
    pub fn read_window(&self, window: PixelWindow, step: u32) -> Result<RasterWindow<'_>, LoadError> {
        match &self.pixels {
            PixelSource::Chunked(layout) => {
                let samples = geotiff::read_window(&self.path, &self.meta, layout, window, step)?;
                Ok(RasterWindow {
                    col0: window.col0,
                    row0: window.row0,
                    step: step.max(1),
                    samples: Cow::Owned(samples),
                })
            }
            PixelSource::Whole(cell) => {
                let result = cell.get_or_init(|| {
                    debug!(path = %self.path.display(), "Decoding raster samples");
                    let meta = &self.meta;
                    let buffer = world_file::read_samples(&self.path)?;
                    RasterSamples::new(meta.width, meta.height, meta.bands, buffer)
                });
                let samples = result
                    .as_ref()
                    .map_err(|detail| LoadError::parse(&self.path, detail))?;
                Ok(RasterWindow {
                    col0: 0,
                    row0: 0,
                    step: 1,
                    samples: Cow::Borrowed(samples),
                })
            }
        }
    }
}

/// Geographic box of a raster, from points densified along its edges.
fn geographic_footprint(meta: &RasterMetadata) -> Result<GeoBounds, LoadError> {
    let transformer = meta.crs.transformer()?;
    let (w, h) = (f64::from(meta.width), f64::from(meta.height));

    let mut edge = Vec::with_capacity(EDGE_SAMPLES * 4);
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
        edge.push((t * w, 0.0));
        edge.push((t * w, h));
        edge.push((0.0, t * h));
        edge.push((w, t * h));
    }

    let mut last_error = None;
    let projected: Vec<(f64, f64)> = edge
        .into_iter()
        .filter_map(|(col, row)| {
            let (x, y) = meta.transform.apply(col, row);
            match transformer.to_lon_lat(x, y) {
                Ok(p) => Some(p),
                Err(e) => {
                    last_error = Some(e);
                    None
                }
            }
        })
        .collect();

    match GeoBounds::from_points(projected, BoundsCrs::Geographic) {
        Some(bounds) => Ok(bounds),
        None => Err(match last_error {
            Some(e) => LoadError::Reprojection(e),
            None => LoadError::UnsupportedLayout("raster has no extent".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, values: Vec<u8>) -> RasterSamples {
        RasterSamples::new(width, height, 1, SampleBuffer::U8(values)).unwrap()
    }

    #[test]
    fn test_geotransform_inverse() {
        let gt = GeoTransform::from_gdal([1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0]);
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.apply(3.5, 7.25);
        let (col, row) = inv.apply(x, y);
        assert!((col - 3.5).abs() < 1e-9);
        assert!((row - 7.25).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_geotransform_inverse() {
        let gt = GeoTransform::from_gdal([0.0, 2.0, 0.5, 0.0, 0.25, -2.0]);
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.apply(11.0, 4.0);
        let (col, row) = inv.apply(x, y);
        assert!((col - 11.0).abs() < 1e-9);
        assert!((row - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_geotransform_has_no_inverse() {
        let gt = GeoTransform::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(gt.inverse().is_none());
    }

    #[test]
    fn test_pixel_size_uses_smallest_dimension() {
        let gt = GeoTransform::from_gdal([0.0, 30.0, 0.0, 0.0, 0.0, -10.0]);
        assert_eq!(gt.pixel_size(), 10.0);
    }

    #[test]
    fn test_samples_layout_checked() {
        assert!(RasterSamples::new(2, 2, 3, SampleBuffer::U8(vec![0; 11])).is_err());
        let s = gray(2, 2, vec![1, 2, 3, 4]);
        assert_eq!(s.get(0, 1, 1), Some(4.0));
        assert_eq!(s.get(0, 2, 0), None);
        assert_eq!(s.get(0, -1, 0), None);
        assert_eq!(s.get(1, 0, 0), None);
    }

    #[test]
    fn test_in_memory_raster_extent() {
        let gt = GeoTransform::from_gdal([10.0, 0.5, 0.0, 20.0, 0.0, -0.5]);
        let ds = RasterDataset::from_samples(gray(4, 2, vec![9; 8]), SampleType::U8, gt, Crs::wgs84(), None)
            .unwrap();

        let geo = ds.geographic_extent();
        assert_eq!(geo, GeoBounds::geographic(10.0, 19.0, 12.0, 20.0));
        assert_eq!(ds.source_extent().min().x, 10.0);
        assert!((ds.pixel_size_meters() - 0.5 * METERS_PER_DEGREE).abs() < 1e-6);

        let window = ds.read_window(PixelWindow::new(1, 0, 2, 1), 4).unwrap();
        assert_eq!(window.step(), 1);
        assert_eq!(window.samples().width(), 4);
    }

    #[test]
    fn test_pixel_window_is_padded_and_clamped() {
        let gt = GeoTransform::from_gdal([0.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        let ds = RasterDataset::from_samples(gray(10, 10, vec![1; 100]), SampleType::U8, gt, Crs::web_mercator(), None)
            .unwrap();

        let inner = Rect::new((25.0, 45.0), (55.0, 75.0));
        assert_eq!(ds.pixel_window(&inner, 1), Some(PixelWindow::new(1, 1, 7, 7)));

        let edge = Rect::new((-50.0, 80.0), (15.0, 150.0));
        assert_eq!(ds.pixel_window(&edge, 0), Some(PixelWindow::new(0, 0, 2, 2)));

        let outside = Rect::new((500.0, 500.0), (600.0, 600.0));
        assert_eq!(ds.pixel_window(&outside, 2), None);
    }

    #[test]
    fn test_window_coordinates_keep_pixel_centres() {
        let window = RasterWindow {
            col0: 6,
            row0: 9,
            step: 3,
            samples: Cow::Owned(gray(2, 2, vec![0; 4])),
        };
        // Source pixel (9, 12) is window sample (1, 1)
        assert_eq!(window.to_window(9.5, 12.5), (1.5, 1.5));
        assert_eq!(window.to_window(6.5, 9.5), (0.5, 0.5));
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        let err = RasterDataset::open(Path::new("/tmp/elevation.img")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { kind: "raster", .. }));
    }
}

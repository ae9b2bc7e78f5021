//! Raster tile reprojection.
//!
//! Each destination pixel centre is carried from web-mercator into the
//! source CRS and then through the inverse source geotransform into source
//! pixel space, where every band is sampled bilinearly. Geographic and
//! web-mercator sources are transformed exactly per pixel; other projected
//! sources are transformed on a 17×17 grid and interpolated in between.
//!
//! Only the source pixels under a tile's footprint are read. When that
//! window is much larger than the tile, every n-th pixel is read instead so
//! low zooms over large rasters stay bounded in memory.

use geo::Rect;
use tracing::{trace, warn};

use super::resample::{to_u8, window_bilinear, CoordGrid};
use super::{SkipReason, TileImage, TileRender, TileRenderer};
use crate::coord::{tile_bounds, tile_bounds_geographic, TileAddress, TILE_SIZE};
use crate::dataset::{GeoTransform, LoadError, RasterDataset};
use crate::projection::{CrsTransformer, ProjectionError};

/// Grid cells per tile edge for projected sources.
const GRID_CELLS: usize = 16;

/// Points per tile edge used to carry the tile footprint into the source CRS.
const EDGE_POINTS: usize = 9;

/// Source pixels kept around a tile footprint for the bilinear taps.
const WINDOW_PAD: u32 = 2;

/// Window samples kept per tile pixel before decimation kicks in.
const SAMPLES_PER_PIXEL: u32 = 2;

/// Resamples a raster into web-mercator tiles.
pub struct RasterRenderer<'a> {
    dataset: &'a RasterDataset,
    inverse: GeoTransform,
    out_channels: usize,
}

impl<'a> RasterRenderer<'a> {
    /// # Errors
    ///
    /// `UnsupportedLayout` when the source geotransform cannot be inverted.
    pub fn new(dataset: &'a RasterDataset) -> Result<Self, LoadError> {
        let inverse = dataset
            .transform()
            .inverse()
            .ok_or_else(|| LoadError::UnsupportedLayout("singular geotransform".to_string()))?;

        let bands = dataset.band_count();
        let out_channels = match bands {
            1..=4 => bands,
            _ => {
                warn!(bands, "Raster has more than 4 bands, rendering the first three as RGB");
                3
            }
        };

        Ok(Self {
            dataset,
            inverse,
            out_channels,
        })
    }

    /// Output channel count: L, LA, RGB or RGBA.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn source_pixel_of(&self, transformer: &CrsTransformer, mx: f64, my: f64) -> Result<(f64, f64), ProjectionError> {
        let (sx, sy) = transformer.from_web_mercator(mx, my)?;
        Ok(self.inverse.apply(sx, sy))
    }

    /// Tile footprint carried into the source CRS, `None` if nothing transforms.
    fn footprint_in_source(&self, transformer: &CrsTransformer, addr: &TileAddress) -> Option<Rect<f64>> {
        let b = tile_bounds(addr);
        let mut lo = (f64::INFINITY, f64::INFINITY);
        let mut hi = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for i in 0..EDGE_POINTS {
            let t = i as f64 / (EDGE_POINTS - 1) as f64;
            let x = b.minx + t * b.width();
            let y = b.miny + t * b.height();
            for (px, py) in [(x, b.miny), (x, b.maxy), (b.minx, y), (b.maxx, y)] {
                if let Ok((sx, sy)) = transformer.from_web_mercator(px, py) {
                    lo = (lo.0.min(sx), lo.1.min(sy));
                    hi = (hi.0.max(sx), hi.1.max(sy));
                }
            }
        }
        (lo.0 <= hi.0 && lo.1 <= hi.1).then(|| Rect::new(lo, hi))
    }
}

fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

impl TileRenderer for RasterRenderer<'_> {
    fn render(&self, addr: &TileAddress) -> TileRender {
        if !tile_bounds_geographic(addr).intersects(&self.dataset.geographic_extent()) {
            return TileRender::Skipped(SkipReason::OutsideSource);
        }

        let transformer = match self.dataset.crs().transformer() {
            Ok(t) => t,
            Err(e) => return TileRender::Failed(e.to_string()),
        };
        let footprint = match self.footprint_in_source(&transformer, addr) {
            Some(footprint) if rects_intersect(&footprint, &self.dataset.source_extent()) => footprint,
            _ => return TileRender::Skipped(SkipReason::OutsideSource),
        };
        let Some(mut window) = self.dataset.pixel_window(&footprint, WINDOW_PAD) else {
            return TileRender::Skipped(SkipReason::OutsideSource);
        };

        let step = (window.width().max(window.height()) / (SAMPLES_PER_PIXEL * TILE_SIZE)).max(1);
        if step > 1 {
            // Keep the padding in decimated samples, not source pixels
            if let Some(wider) = self.dataset.pixel_window(&footprint, WINDOW_PAD * step) {
                window = wider;
            }
        }
        let pixels = match self.dataset.read_window(window, step) {
            Ok(p) => p,
            Err(e) => return TileRender::Unreadable(e),
        };
        trace!(tile = %addr, ?window, step = pixels.step(), "Read source window");

        let size = f64::from(TILE_SIZE);
        let dest = GeoTransform::for_bounds(&tile_bounds(addr), TILE_SIZE, TILE_SIZE);
        let exact = self.dataset.crs().is_geographic() || self.dataset.crs().is_web_mercator();

        let grid = if exact {
            None
        } else {
            match CoordGrid::build(size, GRID_CELLS, |px, py| {
                let (mx, my) = dest.apply(px, py);
                self.source_pixel_of(&transformer, mx, my)
            }) {
                Ok(grid) => Some(grid),
                Err(e) => return TileRender::Failed(e.to_string()),
            }
        };

        let nodata = self.dataset.nodata();
        let (width, height) = (f64::from(self.dataset.width()), f64::from(self.dataset.height()));
        let channels = self.out_channels;
        let tile = TILE_SIZE as usize;
        let mut data = vec![0u8; tile * tile * channels];

        for py in 0..tile {
            for px in 0..tile {
                let (cx, cy) = (px as f64 + 0.5, py as f64 + 0.5);
                let (col, row) = match &grid {
                    Some(grid) => grid.interpolate(cx, cy),
                    None => {
                        let (mx, my) = dest.apply(cx, cy);
                        match self.source_pixel_of(&transformer, mx, my) {
                            Ok(p) => p,
                            Err(e) => return TileRender::Failed(e.to_string()),
                        }
                    }
                };

                if !(col >= 0.0 && row >= 0.0 && col <= width && row <= height) {
                    continue;
                }

                let base = (py * tile + px) * channels;
                for band in 0..channels {
                    if let Some(v) = window_bilinear(&pixels, band, col, row, nodata) {
                        data[base + band] = to_u8(v);
                    }
                }
            }
        }

        if data.iter().all(|&b| b == 0) {
            return TileRender::Skipped(SkipReason::AllNoData);
        }
        trace!(tile = %addr, channels, "Resampled raster tile");

        match TileImage::from_raw(channels, data) {
            Some(image) => TileRender::Rendered(image),
            None => TileRender::Failed("tile buffer has unexpected size".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::tile_size_meters;
    use crate::dataset::{RasterSamples, SampleBuffer, SampleType};
    use crate::projection::Crs;

    /// A raster exactly covering one web-mercator tile.
    fn raster_on_tile(addr: &TileAddress, width: u32, bands: usize, value: u8, nodata: Option<f64>) -> RasterDataset {
        let b = tile_bounds(addr);
        let gt = GeoTransform::for_bounds(&b, width, width);
        let samples = RasterSamples::new(
            width,
            width,
            bands,
            SampleBuffer::U8(vec![value; (width * width) as usize * bands]),
        )
        .unwrap();
        RasterDataset::from_samples(samples, SampleType::U8, gt, Crs::web_mercator(), nodata).unwrap()
    }

    #[test]
    fn test_aligned_tile_copies_values() {
        let addr = TileAddress::new(5, 17, 11).unwrap();
        let ds = raster_on_tile(&addr, 64, 3, 200, None);
        let renderer = RasterRenderer::new(&ds).unwrap();

        match renderer.render(&addr) {
            TileRender::Rendered(image) => {
                assert_eq!(image.channels(), 3);
                assert!(image.as_bytes().iter().all(|&b| b == 200));
            }
            other => panic!("expected rendered tile, got {other:?}"),
        }
    }

    #[test]
    fn test_tile_outside_raster_is_skipped() {
        let addr = TileAddress::new(5, 17, 11).unwrap();
        let ds = raster_on_tile(&addr, 16, 1, 50, None);
        let renderer = RasterRenderer::new(&ds).unwrap();
        let far = TileAddress::new(5, 2, 2).unwrap();
        assert!(matches!(
            renderer.render(&far),
            TileRender::Skipped(SkipReason::OutsideSource)
        ));
    }

    #[test]
    fn test_all_nodata_tile_is_skipped() {
        let addr = TileAddress::new(4, 3, 3).unwrap();
        let ds = raster_on_tile(&addr, 8, 1, 7, Some(7.0));
        let renderer = RasterRenderer::new(&ds).unwrap();
        assert!(matches!(
            renderer.render(&addr),
            TileRender::Skipped(SkipReason::AllNoData)
        ));
    }

    #[test]
    fn test_zero_valued_raster_is_all_nodata() {
        let addr = TileAddress::new(4, 3, 3).unwrap();
        let ds = raster_on_tile(&addr, 8, 1, 0, None);
        let renderer = RasterRenderer::new(&ds).unwrap();
        assert!(matches!(
            renderer.render(&addr),
            TileRender::Skipped(SkipReason::AllNoData)
        ));
    }

    #[test]
    fn test_more_than_four_bands_render_as_rgb() {
        let addr = TileAddress::new(3, 1, 1).unwrap();
        let ds = raster_on_tile(&addr, 4, 5, 90, None);
        let renderer = RasterRenderer::new(&ds).unwrap();
        assert_eq!(renderer.out_channels(), 3);
        match renderer.render(&addr) {
            TileRender::Rendered(image) => assert_eq!(image.channels(), 3),
            other => panic!("expected rendered tile, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_coverage_leaves_zero_outside() {
        // Raster covering only the western half of the tile
        let addr = TileAddress::new(6, 30, 20).unwrap();
        let b = tile_bounds(&addr);
        let half = tile_size_meters(6) / 2.0;
        let gt = GeoTransform::from_gdal([b.minx, half / 8.0, 0.0, b.maxy, 0.0, -tile_size_meters(6) / 16.0]);
        let samples = RasterSamples::new(8, 16, 1, SampleBuffer::U8(vec![255; 128])).unwrap();
        let ds = RasterDataset::from_samples(samples, SampleType::U8, gt, Crs::web_mercator(), None).unwrap();

        let renderer = RasterRenderer::new(&ds).unwrap();
        let TileRender::Rendered(image) = renderer.render(&addr) else {
            panic!("expected rendered tile");
        };
        let bytes = image.as_bytes();
        let row = 100 * TILE_SIZE as usize;
        assert_eq!(bytes[row + 10], 255);
        assert_eq!(bytes[row + 250], 0);
    }

    #[test]
    fn test_projected_source_uses_grid() {
        // UTM 31N raster around the equator at 3°E
        let crs = Crs::from_epsg(32631).unwrap();
        let gt = GeoTransform::from_gdal([400_000.0, 1000.0, 0.0, 100_000.0, 0.0, -1000.0]);
        let samples = RasterSamples::new(200, 200, 1, SampleBuffer::U8(vec![120; 40_000])).unwrap();
        let ds = RasterDataset::from_samples(samples, SampleType::U8, gt, crs, None).unwrap();
        let renderer = RasterRenderer::new(&ds).unwrap();

        let extent = ds.geographic_extent();
        let centre_lon = (extent.minx + extent.maxx) / 2.0;
        let centre_lat = (extent.miny + extent.maxy) / 2.0;
        let point = crate::coord::GeoBounds::geographic(centre_lon, centre_lat, centre_lon, centre_lat);
        let addr = crate::coord::tiles_covering(&point, 9).iter().next().unwrap();

        let TileRender::Rendered(image) = renderer.render(&addr) else {
            panic!("expected rendered tile");
        };
        assert!(image.as_bytes().iter().any(|&b| b == 120));
    }
}

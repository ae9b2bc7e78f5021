//! Zoom planning.
//!
//! Decides which zoom levels a job renders. Explicit bounds always win;
//! otherwise raster datasets derive their maximum zoom from pixel size and
//! vector datasets use a fixed default.

use std::ops::RangeInclusive;

use crate::dataset::Dataset;

/// Ground resolution of one pixel at zoom 0, meters per pixel at the equator.
pub const EQUATOR_RESOLUTION: f64 = 156_543.033_92;

/// Upper clamp for detected raster zoom.
pub const MAX_DETECTED_ZOOM: u8 = 20;

/// Raster max zoom when the pixel size is unusable.
pub const FALLBACK_RASTER_MAX_ZOOM: u8 = 12;

/// Vector max zoom when none is given.
pub const DEFAULT_VECTOR_MAX_ZOOM: u8 = 18;

pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Inclusive zoom interval. `min > max` is allowed and renders nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn levels(&self) -> RangeInclusive<u8> {
        self.min..=self.max
    }
}

impl std::fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Plans the zoom range for a dataset. Never fails.
///
/// # Arguments
///
/// * `dataset` - The loaded dataset
/// * `explicit_min` - Caller-supplied minimum zoom
/// * `explicit_max` - Caller-supplied maximum zoom
pub fn plan(dataset: &Dataset, explicit_min: Option<u8>, explicit_max: Option<u8>) -> ZoomRange {
    let min = explicit_min.unwrap_or(DEFAULT_MIN_ZOOM);
    let max = explicit_max.unwrap_or_else(|| match dataset {
        Dataset::Raster(raster) => detect_max_zoom(raster.pixel_size_meters()),
        Dataset::Vector(_) => DEFAULT_VECTOR_MAX_ZOOM,
    });
    ZoomRange::new(min, max)
}

/// `ceil(log2(EQUATOR_RESOLUTION / pixel_size))`, clamped to `[0, 20]`.
///
/// Non-positive or non-finite sizes fall back to zoom 12.
pub fn detect_max_zoom(pixel_size_meters: f64) -> u8 {
    if !(pixel_size_meters.is_finite() && pixel_size_meters > 0.0) {
        return FALLBACK_RASTER_MAX_ZOOM;
    }
    let zoom = (EQUATOR_RESOLUTION / pixel_size_meters).log2().ceil();
    zoom.clamp(0.0, f64::from(MAX_DETECTED_ZOOM)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{GeoTransform, RasterDataset, RasterSamples, SampleBuffer, SampleType, VectorDataset};
    use crate::projection::Crs;

    fn raster_with_pixel(size: f64, crs: Crs) -> Dataset {
        let samples = RasterSamples::new(2, 2, 1, SampleBuffer::U8(vec![1; 4])).unwrap();
        let gt = GeoTransform::from_gdal([0.0, size, 0.0, 0.0, 0.0, -size]);
        Dataset::Raster(RasterDataset::from_samples(samples, SampleType::U8, gt, crs, None).unwrap())
    }

    #[test]
    fn test_detect_matches_formula() {
        let expected = (156_543.033_92_f64 / 76.437).log2().ceil() as u8;
        assert_eq!(detect_max_zoom(76.437), expected);
        // 76.437 sits just under the zoom-11 resolution of 76.43702828
        assert_eq!(detect_max_zoom(76.437), 12);
        // Exactly the zoom-11 resolution
        assert_eq!(detect_max_zoom(EQUATOR_RESOLUTION / 2048.0), 11);
        assert_eq!(detect_max_zoom(EQUATOR_RESOLUTION), 0);
    }

    #[test]
    fn test_detect_clamps() {
        assert_eq!(detect_max_zoom(0.01), MAX_DETECTED_ZOOM);
        assert_eq!(detect_max_zoom(1e9), 0);
        assert_eq!(detect_max_zoom(0.0), FALLBACK_RASTER_MAX_ZOOM);
        assert_eq!(detect_max_zoom(-5.0), FALLBACK_RASTER_MAX_ZOOM);
        assert_eq!(detect_max_zoom(f64::NAN), FALLBACK_RASTER_MAX_ZOOM);
    }

    #[test]
    fn test_plan_defaults() {
        let vector = Dataset::Vector(VectorDataset::from_geometries(Vec::new(), &Crs::wgs84()).unwrap());
        assert_eq!(plan(&vector, None, None), ZoomRange::new(0, 18));
        assert_eq!(plan(&vector, Some(3), None), ZoomRange::new(3, 18));

        let raster = raster_with_pixel(EQUATOR_RESOLUTION / 512.0, Crs::web_mercator());
        assert_eq!(plan(&raster, None, None), ZoomRange::new(0, 9));
    }

    #[test]
    fn test_plan_explicit_is_verbatim() {
        let raster = raster_with_pixel(10.0, Crs::web_mercator());
        let range = plan(&raster, Some(7), Some(4));
        assert_eq!(range, ZoomRange::new(7, 4));
        assert!(range.is_empty());
        assert_eq!(range.levels().count(), 0);
    }

    #[test]
    fn test_geographic_pixels_converted_to_meters() {
        // One degree at the equator is roughly zoom 1
        let raster = raster_with_pixel(1.0, Crs::wgs84());
        let expected = detect_max_zoom(crate::dataset::METERS_PER_DEGREE);
        assert_eq!(plan(&raster, None, None).max, expected);
        assert_eq!(expected, 1);
    }
}

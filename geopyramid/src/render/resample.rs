//! Bilinear sampling and coarse coordinate grids.

use crate::dataset::{RasterSamples, RasterWindow};

/// Bilinear sample of `band` at fractional source pixel `(col, row)`.
///
/// Pixel centres sit at `(c + 0.5, r + 0.5)`. Positions off the raster yield
/// `None`. Neighbours outside the grid, non-finite or equal to `nodata` are
/// dropped and the remaining weights renormalized; `None` when nothing
/// contributes.
pub(crate) fn bilinear(
    samples: &RasterSamples,
    band: usize,
    col: f64,
    row: f64,
    nodata: Option<f64>,
) -> Option<f64> {
    if !(col >= 0.0
        && row >= 0.0
        && col <= f64::from(samples.width())
        && row <= f64::from(samples.height()))
    {
        return None;
    }

    let u = col - 0.5;
    let v = row - 0.5;
    let c0 = u.floor();
    let r0 = v.floor();
    let fx = u - c0;
    let fy = v - r0;
    let (c0, r0) = (c0 as i64, r0 as i64);

    let taps = [
        (c0, r0, (1.0 - fx) * (1.0 - fy)),
        (c0 + 1, r0, fx * (1.0 - fy)),
        (c0, r0 + 1, (1.0 - fx) * fy),
        (c0 + 1, r0 + 1, fx * fy),
    ];

    let mut acc = 0.0;
    let mut weight = 0.0;
    for (c, r, w) in taps {
        if w <= 0.0 {
            continue;
        }
        let Some(value) = samples.get(band, c, r) else {
            continue;
        };
        if !value.is_finite() || nodata.is_some_and(|nd| value == nd) {
            continue;
        }
        acc += value * w;
        weight += w;
    }

    (weight > 0.0).then(|| acc / weight)
}

/// Bilinear sample of a window at fractional source pixel `(col, row)`.
///
/// The caller has already checked that the position lies on the raster.
pub(crate) fn window_bilinear(
    window: &RasterWindow<'_>,
    band: usize,
    col: f64,
    row: f64,
    nodata: Option<f64>,
) -> Option<f64> {
    let samples = window.samples();
    let (u, v) = window.to_window(col, row);
    let u = u.clamp(0.0, f64::from(samples.width()));
    let v = v.clamp(0.0, f64::from(samples.height()));
    bilinear(samples, band, u, v, nodata)
}

/// Rounds and clamps a sample to a byte.
#[inline]
pub(crate) fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Values known at `(cells + 1)²` evenly spaced nodes over a square of
/// `size` units, bilinearly interpolated in between.
pub(crate) struct CoordGrid {
    cells: usize,
    step: f64,
    nodes: Vec<(f64, f64)>,
}

impl CoordGrid {
    /// Evaluates `f` at every node. Stops at the first failure.
    pub(crate) fn build<F, E>(size: f64, cells: usize, mut f: F) -> Result<Self, E>
    where
        F: FnMut(f64, f64) -> Result<(f64, f64), E>,
    {
        let step = size / cells as f64;
        let mut nodes = Vec::with_capacity((cells + 1) * (cells + 1));
        for j in 0..=cells {
            for i in 0..=cells {
                nodes.push(f(i as f64 * step, j as f64 * step)?);
            }
        }
        Ok(Self { cells, step, nodes })
    }

    pub(crate) fn interpolate(&self, x: f64, y: f64) -> (f64, f64) {
        let gx = (x / self.step).clamp(0.0, self.cells as f64);
        let gy = (y / self.step).clamp(0.0, self.cells as f64);
        let i = (gx.floor() as usize).min(self.cells - 1);
        let j = (gy.floor() as usize).min(self.cells - 1);
        let (tx, ty) = (gx - i as f64, gy - j as f64);

        let stride = self.cells + 1;
        let n00 = self.nodes[j * stride + i];
        let n10 = self.nodes[j * stride + i + 1];
        let n01 = self.nodes[(j + 1) * stride + i];
        let n11 = self.nodes[(j + 1) * stride + i + 1];

        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
        (
            lerp(lerp(n00.0, n10.0, tx), lerp(n01.0, n11.0, tx), ty),
            lerp(lerp(n00.1, n10.1, tx), lerp(n01.1, n11.1, tx), ty),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SampleBuffer;

    fn samples() -> RasterSamples {
        // 2x2 single band
        RasterSamples::new(2, 2, 1, SampleBuffer::U8(vec![0, 100, 200, 255])).unwrap()
    }

    #[test]
    fn test_pixel_centre_returns_exact_value() {
        let s = samples();
        assert_eq!(bilinear(&s, 0, 0.5, 0.5, None), Some(0.0));
        assert_eq!(bilinear(&s, 0, 1.5, 1.5, None), Some(255.0));
    }

    #[test]
    fn test_midpoint_blends_neighbours() {
        let s = samples();
        let v = bilinear(&s, 0, 1.0, 0.5, None).unwrap();
        assert!((v - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_nodata_is_excluded() {
        let s = samples();
        let v = bilinear(&s, 0, 1.0, 0.5, Some(0.0)).unwrap();
        assert!((v - 100.0).abs() < 1e-9);
        assert_eq!(bilinear(&s, 0, 0.5, 0.5, Some(0.0)), None);
    }

    #[test]
    fn test_outside_is_none() {
        let s = samples();
        assert_eq!(bilinear(&s, 0, -3.0, 0.5, None), None);
        assert_eq!(bilinear(&s, 0, 0.5, 9.0, None), None);
    }

    #[test]
    fn test_to_u8_rounds_and_clamps() {
        assert_eq!(to_u8(127.5), 128);
        assert_eq!(to_u8(-4.0), 0);
        assert_eq!(to_u8(1000.0), 255);
    }

    #[test]
    fn test_grid_reproduces_affine_map() {
        let grid = CoordGrid::build(256.0, 16, |x, y| Ok::<_, ()>((2.0 * x + 1.0, y - 3.0))).unwrap();
        let (a, b) = grid.interpolate(100.5, 37.25);
        assert!((a - 202.0).abs() < 1e-9);
        assert!((b - 34.25).abs() < 1e-9);
    }
}

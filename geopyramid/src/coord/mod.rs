//! Tile coordinate math
//!
//! Conversions between tile addresses, web-mercator meters and geographic
//! degrees, plus enumeration of the tiles covering a geographic box.

mod types;

pub use types::{
    tiles_per_side, BoundsCrs, CoordError, GeoBounds, TileAddress, TileRange, TileRangeIter,
    MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, ORIGIN_SHIFT, TILE_SIZE, WORLD_SIZE,
};

use std::f64::consts::PI;

/// Inward nudge applied to the east and south edges before indexing.
const EDGE_EPSILON: f64 = 1e-11;

/// Latitude beyond which a box is considered entirely off the map.
const LAT_CUTOFF: f64 = 85.06;

/// Projects longitude/latitude degrees to web-mercator meters.
///
/// Latitudes are clamped to the mercator range first, so poles map to the
/// world edge rather than to infinity.
#[inline]
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let x = lon * ORIGIN_SHIFT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() * ORIGIN_SHIFT / PI;
    (x, y)
}

/// Inverse of [`lon_lat_to_mercator`].
#[inline]
pub fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / ORIGIN_SHIFT;
    let lat = (y * PI / ORIGIN_SHIFT).exp().atan() * 360.0 / PI - 90.0;
    (lon, lat)
}

/// Edge length of a tile in web-mercator meters at the given zoom.
#[inline]
pub fn tile_size_meters(z: u8) -> f64 {
    WORLD_SIZE / tiles_per_side(z) as f64
}

/// Footprint of a tile in web-mercator meters.
///
/// # Arguments
///
/// * `addr` - The tile address
///
/// # Returns
///
/// Bounds whose width and height both equal `WORLD_SIZE / 2^z`. Row 0 is the
/// northernmost row.
pub fn tile_bounds(addr: &TileAddress) -> GeoBounds {
    let size = tile_size_meters(addr.z());
    let minx = -ORIGIN_SHIFT + addr.x() as f64 * size;
    let maxy = ORIGIN_SHIFT - addr.y() as f64 * size;
    GeoBounds::web_mercator(minx, maxy - size, minx + size, maxy)
}

/// Footprint of a tile in longitude/latitude degrees.
pub fn tile_bounds_geographic(addr: &TileAddress) -> GeoBounds {
    tile_bounds(addr).to_geographic()
}

/// Column/row containing a point, clamped to the grid.
fn tile_index(lon: f64, lat: f64, z: u8) -> (u32, u32) {
    let n = tiles_per_side(z) as f64;
    let lat_rad = lat.to_radians();

    let col = ((lon + 180.0) / 360.0 * n).floor();
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    let last = n - 1.0;
    (col.clamp(0.0, last) as u32, row.clamp(0.0, last) as u32)
}

/// Enumerates the tiles at zoom `z` that intersect a box.
///
/// Web-mercator bounds are converted to degrees first. The east and south
/// edges are nudged inward by `1e-11` degrees, so a box edge lying exactly on
/// a tile boundary does not pull in the neighbouring tile.
///
/// # Returns
///
/// An empty range when the bounds are invalid, lie entirely outside
/// `[-180, 180] × [-85.06, 85.06]`, or `z` exceeds [`MAX_ZOOM`].
pub fn tiles_covering(bounds: &GeoBounds, z: u8) -> TileRange {
    let bounds = bounds.to_geographic();

    if !bounds.is_valid() || z > MAX_ZOOM {
        return TileRange::empty(z);
    }
    if bounds.maxx < MIN_LON
        || bounds.minx > MAX_LON
        || bounds.maxy < -LAT_CUTOFF
        || bounds.miny > LAT_CUTOFF
    {
        return TileRange::empty(z);
    }

    let west = bounds.minx.max(MIN_LON);
    let east = bounds.maxx.min(MAX_LON);
    let south = bounds.miny.max(MIN_LAT);
    let north = bounds.maxy.min(MAX_LAT);

    let (min_x, min_y) = tile_index(west, north, z);
    let (max_x, max_y) = tile_index(
        (east - EDGE_EPSILON).max(west),
        (south + EDGE_EPSILON).min(north),
        z,
    );

    TileRange::new(z, min_x, max_x, min_y, max_y)
}

#[cfg(test)]
mod tests;

//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.0511287798;
pub const MAX_LAT: f64 = 85.0511287798;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Half the width of the web-mercator world square, in meters.
pub const ORIGIN_SHIFT: f64 = 20_037_508.342_789_244;

/// Full width of the web-mercator world square (equatorial circumference).
pub const WORLD_SIZE: f64 = 40_075_016.685_578_49;

/// Highest zoom level whose tile indices still fit a `u32`.
pub const MAX_ZOOM: u8 = 31;

/// Edge length of every rendered tile, in pixels.
pub const TILE_SIZE: u32 = 256;

/// Reference system a [`GeoBounds`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundsCrs {
    /// EPSG:3857 meters
    WebMercator,
    /// WGS84 longitude/latitude degrees
    Geographic,
}

impl fmt::Display for BoundsCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsCrs::WebMercator => write!(f, "EPSG:3857"),
            BoundsCrs::Geographic => write!(f, "EPSG:4326"),
        }
    }
}

/// Axis-aligned rectangle tagged with its reference system.
///
/// Bounds with `minx > maxx`, `miny > maxy` or a non-finite member are
/// invalid and behave as empty. Zero-width bounds (a single point) are valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
    pub crs: BoundsCrs,
}

impl GeoBounds {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64, crs: BoundsCrs) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
            crs,
        }
    }

    /// Bounds in web-mercator meters.
    pub fn web_mercator(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self::new(minx, miny, maxx, maxy, BoundsCrs::WebMercator)
    }

    /// Bounds in longitude/latitude degrees.
    pub fn geographic(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self::new(minx, miny, maxx, maxy, BoundsCrs::Geographic)
    }

    /// The whole addressable web-mercator world in degrees.
    pub fn world() -> Self {
        Self::geographic(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)
    }

    /// Smallest bounds containing every point, or `None` for no points.
    pub fn from_points<I>(points: I, crs: BoundsCrs) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc: Option<Self>, (x, y)| {
            Some(match acc {
                None => Self::new(x, y, x, y, crs),
                Some(b) => Self::new(b.minx.min(x), b.miny.min(y), b.maxx.max(x), b.maxy.max(y), crs),
            })
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.minx.is_finite()
            && self.miny.is_finite()
            && self.maxx.is_finite()
            && self.maxy.is_finite()
            && self.minx <= self.maxx
            && self.miny <= self.maxy
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// Closed-interval intersection test. Invalid bounds intersect nothing.
    ///
    /// Both operands must use the same reference system.
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        debug_assert_eq!(self.crs, other.crs, "bounds compared across reference systems");
        self.is_valid()
            && other.is_valid()
            && self.minx <= other.maxx
            && other.minx <= self.maxx
            && self.miny <= other.maxy
            && other.miny <= self.maxy
    }

    /// Smallest bounds containing both operands.
    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        GeoBounds::new(
            self.minx.min(other.minx),
            self.miny.min(other.miny),
            self.maxx.max(other.maxx),
            self.maxy.max(other.maxy),
            self.crs,
        )
    }

    /// Converts to degrees. Corner-wise conversion is exact because the
    /// mercator projection is separable and monotonic.
    pub fn to_geographic(&self) -> GeoBounds {
        match self.crs {
            BoundsCrs::Geographic => *self,
            BoundsCrs::WebMercator => {
                let (minx, miny) = super::mercator_to_lon_lat(self.minx, self.miny);
                let (maxx, maxy) = super::mercator_to_lon_lat(self.maxx, self.maxy);
                GeoBounds::geographic(minx, miny, maxx, maxy)
            }
        }
    }

    /// Converts to web-mercator meters, clamping latitudes to the mercator range.
    pub fn to_web_mercator(&self) -> GeoBounds {
        match self.crs {
            BoundsCrs::WebMercator => *self,
            BoundsCrs::Geographic => {
                let (minx, miny) = super::lon_lat_to_mercator(self.minx, self.miny);
                let (maxx, maxy) = super::lon_lat_to_mercator(self.maxx, self.maxy);
                GeoBounds::web_mercator(minx, miny, maxx, maxy)
            }
        }
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}] ({})",
            self.minx, self.miny, self.maxx, self.maxy, self.crs
        )
    }
}

/// Address of one tile in the slippy-map scheme.
///
/// Origin is the top-left (north-west) corner of the world; `y` grows
/// southward. Construction through [`TileAddress::new`] guarantees
/// `x, y < 2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    z: u8,
    x: u32,
    y: u32,
}

impl TileAddress {
    /// Creates a validated tile address.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let n = tiles_per_side(z);
        if u64::from(x) >= n {
            return Err(CoordError::ColumnOutOfRange { z, x });
        }
        if u64::from(y) >= n {
            return Err(CoordError::RowOutOfRange { z, y });
        }
        Ok(Self { z, x, y })
    }

    /// Caller guarantees the invariant.
    #[inline]
    pub(crate) fn new_unchecked(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    #[inline]
    pub fn z(&self) -> u8 {
        self.z
    }

    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tile columns (and rows) at a zoom level.
#[inline]
pub fn tiles_per_side(z: u8) -> u64 {
    1u64 << z
}

/// Rectangular block of tiles at one zoom level.
///
/// Finite and restartable: iterating a copy never consumes the range.
/// Tiles are yielded column by column, north to south within a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    z: u8,
    // Inclusive; `None` for an empty range.
    cols: Option<(u32, u32)>,
    rows: Option<(u32, u32)>,
}

impl TileRange {
    pub(crate) fn new(z: u8, min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> Self {
        if min_x > max_x || min_y > max_y {
            return Self::empty(z);
        }
        Self {
            z,
            cols: Some((min_x, max_x)),
            rows: Some((min_y, max_y)),
        }
    }

    pub fn empty(z: u8) -> Self {
        Self {
            z,
            cols: None,
            rows: None,
        }
    }

    #[inline]
    pub fn zoom(&self) -> u8 {
        self.z
    }

    /// Inclusive column span, `None` when empty.
    pub fn columns(&self) -> Option<(u32, u32)> {
        self.cols
    }

    /// Inclusive row span, `None` when empty.
    pub fn rows(&self) -> Option<(u32, u32)> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_none() || self.rows.is_none()
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> u64 {
        match (self.cols, self.rows) {
            (Some((x0, x1)), Some((y0, y1))) => {
                (u64::from(x1) - u64::from(x0) + 1) * (u64::from(y1) - u64::from(y0) + 1)
            }
            _ => 0,
        }
    }

    pub fn contains(&self, addr: &TileAddress) -> bool {
        match (self.cols, self.rows) {
            (Some((x0, x1)), Some((y0, y1))) => {
                addr.z() == self.z
                    && (x0..=x1).contains(&addr.x())
                    && (y0..=y1).contains(&addr.y())
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            next: match (self.cols, self.rows) {
                (Some((x0, _)), Some((y0, _))) => Some((x0, y0)),
                _ => None,
            },
            remaining: self.len(),
        }
    }
}

impl IntoIterator for TileRange {
    type Item = TileAddress;
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &TileRange {
    type Item = TileAddress;
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the tiles of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    next: Option<(u32, u32)>,
    remaining: u64,
}

impl Iterator for TileRangeIter {
    type Item = TileAddress;

    fn next(&mut self) -> Option<Self::Item> {
        let (x, y) = self.next?;
        let (_, max_x) = self.range.cols?;
        let (min_y, max_y) = self.range.rows?;

        self.next = if y < max_y {
            Some((x, y + 1))
        } else if x < max_x {
            Some((x + 1, min_y))
        } else {
            None
        };
        self.remaining = self.remaining.saturating_sub(1);

        Some(TileAddress::new_unchecked(self.range.z, x, y))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl std::iter::FusedIterator for TileRangeIter {}

/// Errors that can occur when constructing tile addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Zoom level above [`MAX_ZOOM`]
    InvalidZoom(u8),
    /// Column index not below `2^z`
    ColumnOutOfRange { z: u8, x: u32 },
    /// Row index not below `2^z`
    RowOutOfRange { z: u8, y: u32 },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidZoom(zoom) => {
                write!(f, "Invalid zoom level: {} (must be at most {})", zoom, MAX_ZOOM)
            }
            CoordError::ColumnOutOfRange { z, x } => {
                write!(f, "Tile column {} out of range at zoom {}", x, z)
            }
            CoordError::RowOutOfRange { z, y } => {
                write!(f, "Tile row {} out of range at zoom {}", y, z)
            }
        }
    }
}

impl std::error::Error for CoordError {}

//! Coordinate reference systems and transforms.
//!
//! Every CRS is identified by its EPSG code. Geographic WGS84 and
//! web-mercator are handled with inline formulas; any other supported code is
//! resolved to a proj-string and transformed with `proj4rs`.
//!
//! A [`CrsTransformer`] converts between one CRS and WGS84 longitude/latitude.
//! Transformers own their `proj4rs` state and are cheap to rebuild, so render
//! workers construct their own instead of sharing one.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;

use crate::coord::{lon_lat_to_mercator, mercator_to_lon_lat};

/// WGS84 geographic
pub const EPSG_WGS84: u32 = 4326;
/// Web Mercator / Pseudo-Mercator
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Alternative codes historically used for web-mercator.
const WEB_MERCATOR_ALIASES: [u32; 5] = [3857, 900913, 3785, 102100, 102113];

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Errors raised while resolving or applying a CRS.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("EPSG:{0} is not supported")]
    UnsupportedEpsg(u32),

    #[error("Invalid projection definition for EPSG:{epsg}: {detail}")]
    InvalidDefinition { epsg: u32, detail: String },

    #[error("Transform of ({x}, {y}) failed: {detail}")]
    TransformFailed { x: f64, y: f64, detail: String },
}

/// Broad family of a CRS, which decides the transform path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CrsKind {
    /// Longitude/latitude degrees on a WGS84-compatible datum
    Geographic,
    WebMercator,
    /// Any other projected system, with its proj-string
    Projected(String),
}

/// A coordinate reference system known to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    epsg: u32,
    kind: CrsKind,
}

impl Crs {
    /// Resolves an EPSG code.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnsupportedEpsg`] for codes without a known
    /// definition.
    pub fn from_epsg(epsg: u32) -> Result<Self, ProjectionError> {
        let kind = if WEB_MERCATOR_ALIASES.contains(&epsg) {
            CrsKind::WebMercator
        } else if is_geographic_epsg(epsg) {
            CrsKind::Geographic
        } else {
            let definition = projected_definition(epsg).ok_or(ProjectionError::UnsupportedEpsg(epsg))?;
            CrsKind::Projected(definition)
        };
        Ok(Self { epsg, kind })
    }

    pub fn wgs84() -> Self {
        Self {
            epsg: EPSG_WGS84,
            kind: CrsKind::Geographic,
        }
    }

    pub fn web_mercator() -> Self {
        Self {
            epsg: EPSG_WEB_MERCATOR,
            kind: CrsKind::WebMercator,
        }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// True when coordinates are longitude/latitude degrees.
    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    pub fn is_web_mercator(&self) -> bool {
        self.kind == CrsKind::WebMercator
    }

    /// Builds a transformer between this CRS and WGS84.
    pub fn transformer(&self) -> Result<CrsTransformer, ProjectionError> {
        let path = match &self.kind {
            CrsKind::Geographic => TransformPath::Geographic,
            CrsKind::WebMercator => TransformPath::WebMercator,
            CrsKind::Projected(definition) => {
                let source = Proj::from_proj_string(definition).map_err(|e| {
                    ProjectionError::InvalidDefinition {
                        epsg: self.epsg,
                        detail: format!("{e:?}"),
                    }
                })?;
                let wgs84 = Proj::from_proj_string(WGS84_PROJ).map_err(|e| {
                    ProjectionError::InvalidDefinition {
                        epsg: EPSG_WGS84,
                        detail: format!("{e:?}"),
                    }
                })?;
                TransformPath::Proj4rs {
                    source: Box::new(source),
                    wgs84: Box::new(wgs84),
                }
            }
        };
        Ok(CrsTransformer { path })
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

enum TransformPath {
    Geographic,
    WebMercator,
    Proj4rs { source: Box<Proj>, wgs84: Box<Proj> },
}

/// Converts coordinates between one CRS and WGS84 / web-mercator.
pub struct CrsTransformer {
    path: TransformPath,
}

impl CrsTransformer {
    /// Source CRS coordinates to longitude/latitude degrees.
    pub fn to_lon_lat(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        match &self.path {
            TransformPath::Geographic => Ok((x, y)),
            TransformPath::WebMercator => Ok(mercator_to_lon_lat(x, y)),
            TransformPath::Proj4rs { source, wgs84 } => {
                let (lon, lat) = run(source, wgs84, x, y)?;
                Ok((lon.to_degrees(), lat.to_degrees()))
            }
        }
    }

    /// Longitude/latitude degrees to source CRS coordinates.
    pub fn from_lon_lat(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        match &self.path {
            TransformPath::Geographic => Ok((lon, lat)),
            TransformPath::WebMercator => Ok(lon_lat_to_mercator(lon, lat)),
            TransformPath::Proj4rs { source, wgs84 } => {
                run(wgs84, source, lon.to_radians(), lat.to_radians())
            }
        }
    }

    /// Source CRS coordinates to web-mercator meters.
    pub fn to_web_mercator(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if let TransformPath::WebMercator = self.path {
            return Ok((x, y));
        }
        let (lon, lat) = self.to_lon_lat(x, y)?;
        Ok(lon_lat_to_mercator(lon, lat))
    }

    /// Web-mercator meters to source CRS coordinates.
    pub fn from_web_mercator(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if let TransformPath::WebMercator = self.path {
            return Ok((x, y));
        }
        let (lon, lat) = mercator_to_lon_lat(x, y);
        self.from_lon_lat(lon, lat)
    }
}

fn run(from: &Proj, to: &Proj, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
    let mut point = (x, y, 0.0);
    transform(from, to, &mut point).map_err(|e| ProjectionError::TransformFailed {
        x,
        y,
        detail: format!("{e:?}"),
    })?;
    if !point.0.is_finite() || !point.1.is_finite() {
        return Err(ProjectionError::TransformFailed {
            x,
            y,
            detail: "non-finite result".to_string(),
        });
    }
    Ok((point.0, point.1))
}

/// Geographic systems treated as WGS84 (datum shifts below tile precision).
fn is_geographic_epsg(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4269 | 4258 | 4283 | 4617 | 4619 | 4674)
}

/// Proj-string for a supported projected EPSG code.
fn projected_definition(epsg: u32) -> Option<String> {
    let definition = match epsg {
        3395 => "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs".to_string(),
        3035 => "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +units=m +no_defs"
            .to_string(),
        2154 => "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 \
                 +ellps=GRS80 +units=m +no_defs"
            .to_string(),
        27700 => "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 \
                  +ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 \
                  +units=m +no_defs"
            .to_string(),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", epsg - 32600),
        32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            epsg - 32700
        ),
        25828..=25838 => format!("+proj=utm +zone={} +ellps=GRS80 +units=m +no_defs", epsg - 25800),
        26901..=26923 => format!("+proj=utm +zone={} +datum=NAD83 +units=m +no_defs", epsg - 26900),
        _ => return None,
    };
    Some(definition)
}

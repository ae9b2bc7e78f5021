//! ESRI `.prj` sidecars.
//!
//! Only the EPSG code is taken from the WKT. Files without an EPSG
//! `AUTHORITY` are accepted when they use the ESRI names for WGS84 or
//! web-mercator; anything else is an unsupported CRS.

use std::fs;
use std::io;
use std::path::Path;

use super::LoadError;
use crate::projection::{Crs, EPSG_WEB_MERCATOR, EPSG_WGS84};

/// CRS declared by the `.prj` next to `path`, `None` when there is none.
pub(crate) fn read_sidecar_crs(path: &Path) -> Result<Option<Crs>, LoadError> {
    let prj = path.with_extension("prj");
    let wkt = match fs::read_to_string(&prj) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LoadError::io(&prj, e)),
    };

    let epsg = epsg_from_wkt(&wkt)
        .or_else(|| epsg_from_esri_name(&wkt))
        .ok_or_else(|| LoadError::UnsupportedCrs(format!("{} has no EPSG authority", prj.display())))?;
    Crs::from_epsg(epsg)
        .map(Some)
        .map_err(|_| LoadError::UnsupportedCrs(format!("EPSG:{epsg}")))
}

/// EPSG code of the outermost `AUTHORITY["EPSG", ...]` in a WKT string.
pub(crate) fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    let compact: String = wkt.chars().filter(|c| !c.is_whitespace()).collect();
    let marker = "AUTHORITY[\"EPSG\",";
    let start = compact.to_ascii_uppercase().rfind(marker)? + marker.len();
    let digits: String = compact[start..]
        .chars()
        .skip_while(|c| *c == '"')
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn epsg_from_esri_name(wkt: &str) -> Option<u32> {
    let upper = wkt.trim_start().to_ascii_uppercase();
    if upper.starts_with("PROJCS[\"WGS_1984_WEB_MERCATOR") {
        Some(EPSG_WEB_MERCATOR)
    } else if upper.starts_with("GEOGCS[\"GCS_WGS_1984\"") {
        Some(EPSG_WGS84)
    } else {
        None
    }
}

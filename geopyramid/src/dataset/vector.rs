//! Vector datasets from GeoJSON, ESRI shapefiles and KML.
//!
//! Geometries are reprojected to web-mercator once at load time, so the
//! renderer and spatial index work in a single planar space.

use std::fmt;
use std::fs;
use std::path::Path;

use geo::{BoundingRect, Coord, Geometry, MapCoords};
use geojson::{GeoJson, JsonObject, JsonValue};
use tracing::{debug, info};

use super::{prj, LoadError};
use crate::coord::GeoBounds;
use crate::projection::Crs;

/// File formats a vector source can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
    /// `.shp` with its `.shx` index and a `.prj` sidecar
    Shapefile,
    Kml,
}

impl VectorFormat {
    /// Format implied by the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "geojson" | "json" => Some(VectorFormat::GeoJson),
            "shp" => Some(VectorFormat::Shapefile),
            "kml" => Some(VectorFormat::Kml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorFormat::GeoJson => "geojson",
            VectorFormat::Shapefile => "shapefile",
            VectorFormat::Kml => "kml",
        }
    }
}

impl fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One geometry with its attributes, in web-mercator meters.
#[derive(Debug, Clone)]
pub struct VectorFeature {
    pub geometry: Geometry<f64>,
    pub properties: Option<JsonObject>,
    bounds: Option<GeoBounds>,
}

impl VectorFeature {
    fn new(geometry: Geometry<f64>, properties: Option<JsonObject>) -> Self {
        let bounds = geometry
            .bounding_rect()
            .map(|r| GeoBounds::web_mercator(r.min().x, r.min().y, r.max().x, r.max().y));
        Self {
            geometry,
            properties,
            bounds,
        }
    }

    /// Bounding box in web-mercator, `None` for empty geometries.
    pub fn bounds(&self) -> Option<GeoBounds> {
        self.bounds
    }
}

/// Ordered feature collection normalized to web-mercator.
#[derive(Debug, Clone)]
pub struct VectorDataset {
    features: Vec<VectorFeature>,
    extent: Option<GeoBounds>,
    source_crs: Crs,
}

impl VectorDataset {
    /// Opens a GeoJSON, shapefile or KML file, chosen by extension.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for other extensions, `Io` for unreadable files,
    /// `Parse` for malformed documents, `MissingCrs` for a shapefile without
    /// `.prj` and `UnsupportedCrs` for a CRS naming an unknown system.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let format = VectorFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
            kind: "vector",
            path: path.to_path_buf(),
        })?;

        let dataset = match format {
            VectorFormat::GeoJson => {
                let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
                Self::from_geojson_str(&text, path)?
            }
            VectorFormat::Shapefile => Self::from_shapefile(path)?,
            VectorFormat::Kml => {
                let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
                Self::from_kml_str(&text, path)?
            }
        };

        info!(
            path = %path.display(),
            format = %format,
            features = dataset.len(),
            crs = %dataset.source_crs(),
            "Opened vector dataset"
        );
        Ok(dataset)
    }

    /// Reads an ESRI shapefile. Attributes in the `.dbf` are not read.
    ///
    /// The CRS comes from the `.prj` sidecar, which is required.
    pub fn from_shapefile(path: &Path) -> Result<Self, LoadError> {
        fs::metadata(path).map_err(|e| LoadError::io(path, e))?;
        let crs = prj::read_sidecar_crs(path)?.ok_or_else(|| LoadError::MissingCrs {
            path: path.to_path_buf(),
        })?;

        let shapes = shapefile::read_shapes(path).map_err(|e| LoadError::parse(path, e))?;
        let total = shapes.len();
        let geometries: Vec<Geometry<f64>> = shapes
            .into_iter()
            .filter_map(|shape| Geometry::<f64>::try_from(shape).ok())
            .collect();
        if geometries.len() < total {
            debug!(skipped = total - geometries.len(), path = %path.display(), "Ignored null shapes");
        }

        Self::from_geometries(geometries, &crs)
    }

    /// Parses a KML document. KML coordinates are always WGS84; altitudes
    /// are dropped.
    pub fn from_kml_str(text: &str, origin: &Path) -> Result<Self, LoadError> {
        let document: kml::Kml = text.parse().map_err(|e| LoadError::parse(origin, e))?;
        let collection = kml::quick_collection(document).map_err(|e| LoadError::parse(origin, e))?;
        Self::from_geometries(collection.0, &Crs::wgs84())
    }

    /// Parses a GeoJSON document. `origin` is used only in error messages.
    pub fn from_geojson_str(text: &str, origin: &Path) -> Result<Self, LoadError> {
        let document: GeoJson = text.parse().map_err(|e| LoadError::parse(origin, e))?;

        let (members, raw) = match document {
            GeoJson::FeatureCollection(fc) => (
                fc.foreign_members,
                fc.features
                    .into_iter()
                    .map(|f| (f.geometry, f.properties))
                    .collect::<Vec<_>>(),
            ),
            GeoJson::Feature(f) => (f.foreign_members, vec![(f.geometry, f.properties)]),
            GeoJson::Geometry(g) => (g.foreign_members.clone(), vec![(Some(g), None)]),
        };

        let crs = crs_from_members(members.as_ref())?;

        let mut geometries = Vec::with_capacity(raw.len());
        let mut skipped = 0usize;
        for (geometry, properties) in raw {
            let Some(geometry) = geometry else {
                skipped += 1;
                continue;
            };
            let geometry = Geometry::<f64>::try_from(geometry).map_err(|e| LoadError::parse(origin, e))?;
            geometries.push((geometry, properties));
        }
        if skipped > 0 {
            debug!(skipped, path = %origin.display(), "Ignored features without geometry");
        }

        Self::from_features(geometries, &crs)
    }

    /// Builds a dataset from geometries in `crs`, without attributes.
    pub fn from_geometries<I>(geometries: I, crs: &Crs) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        Self::from_features(geometries.into_iter().map(|g| (g, None)), crs)
    }

    fn from_features<I>(features: I, crs: &Crs) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (Geometry<f64>, Option<JsonObject>)>,
    {
        let transformer = crs.transformer()?;
        let reproject = !crs.is_web_mercator();

        let mut out = Vec::new();
        let mut extent: Option<GeoBounds> = None;
        for (geometry, properties) in features {
            let geometry = if reproject {
                geometry.try_map_coords(|c| {
                    transformer
                        .to_web_mercator(c.x, c.y)
                        .map(|(x, y)| Coord { x, y })
                })?
            } else {
                geometry
            };

            let feature = VectorFeature::new(geometry, properties);
            if let Some(b) = feature.bounds() {
                extent = Some(extent.map_or(b, |e| e.union(&b)));
            }
            out.push(feature);
        }

        Ok(Self {
            features: out,
            extent,
            source_crs: crs.clone(),
        })
    }

    pub fn features(&self) -> &[VectorFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of all feature boxes in web-mercator, `None` when nothing has extent.
    pub fn extent(&self) -> Option<GeoBounds> {
        self.extent
    }

    pub fn geographic_extent(&self) -> Option<GeoBounds> {
        self.extent.map(|e| e.to_geographic())
    }

    /// CRS the source file was declared in.
    pub fn source_crs(&self) -> &Crs {
        &self.source_crs
    }
}

/// Resolves the legacy `crs` member; absent means WGS84 (RFC 7946).
fn crs_from_members(members: Option<&JsonObject>) -> Result<Crs, LoadError> {
    let crs = match members.and_then(|m| m.get("crs")) {
        None | Some(JsonValue::Null) => return Ok(Crs::wgs84()),
        Some(crs) => crs,
    };

    let properties = crs.get("properties");
    let epsg = if let Some(name) = properties.and_then(|p| p.get("name")).and_then(JsonValue::as_str) {
        epsg_from_name(name).ok_or_else(|| LoadError::UnsupportedCrs(name.to_string()))?
    } else if let Some(code) = properties.and_then(|p| p.get("code")).and_then(JsonValue::as_u64) {
        u32::try_from(code).map_err(|_| LoadError::UnsupportedCrs(code.to_string()))?
    } else {
        return Err(LoadError::UnsupportedCrs(crs.to_string()));
    };

    Crs::from_epsg(epsg).map_err(|_| LoadError::UnsupportedCrs(format!("EPSG:{epsg}")))
}

/// Accepts `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857` and the OGC CRS84 URN.
fn epsg_from_name(name: &str) -> Option<u32> {
    let upper = name.to_ascii_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
        return Some(crate::projection::EPSG_WGS84);
    }
    if !upper.contains("EPSG") {
        return None;
    }
    upper.rsplit(':').next()?.trim().parse().ok()
}

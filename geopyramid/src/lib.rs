//! GeoPyramid - pre-rendered web-mercator tile pyramids
//!
//! Turns a geospatial source (GeoJSON, KML or shapefile vectors, GeoTIFF or world-file
//! georeferenced rasters) into 256×256 PNG tiles laid out as
//! `{tiles_root}/{layer_id}/{z}/{x}/{y}.png` in the XYZ slippy-map scheme.
//! A missing tile means "no data there".
//!
//! # High-Level API
//!
//! ```ignore
//! use geopyramid::config::StorageConfig;
//! use geopyramid::dataset::DatasetKind;
//! use geopyramid::orchestrator::{TilingJob, TilingOrchestrator};
//! use geopyramid::pyramid::LayerId;
//!
//! let storage = StorageConfig::new("/srv/uploads", "/srv/tiles");
//! let orchestrator = TilingOrchestrator::new(storage, 0)?;
//! let job = TilingJob::new(DatasetKind::Vector, "parcels.geojson", LayerId::new("parcels")?);
//! let report = orchestrator.run(job)?;
//! println!("{}", report.tile_url_template());
//! ```
//!
//! Long-running hosts queue jobs through [`service::TilingDaemon`] instead.

pub mod config;
pub mod coord;
pub mod dataset;
pub mod index;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod projection;
pub mod pyramid;
pub mod render;
pub mod service;

/// Version of the library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

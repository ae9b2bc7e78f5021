//! CLI error handling with user-friendly messages.
//!
//! Every failure ends the process with exit code 1.

use std::fmt;
use std::process;

use geopyramid::config::ConfigFileError;
use geopyramid::orchestrator::{JobErrorKind, JobFailure, OrchestratorError};
use geopyramid::pyramid::InvalidLayerId;
use geopyramid::service::ServiceError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Layer id given or derived is not a single path segment
    InvalidLayer(InvalidLayerId),
    /// Zoom overrides out of order
    InvalidZoom { min: u8, max: u8 },
    /// Working directory unavailable for resolving a relative source
    CurrentDir(std::io::Error),
    /// Async runtime could not start
    Runtime(std::io::Error),
    /// Render pool could not start
    Orchestrator(OrchestratorError),
    /// Job could not be queued
    Service(ServiceError),
    /// Job ran and failed
    Job(JobFailure),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Job(failure) = self {
            if failure.kind == JobErrorKind::Load {
                eprintln!();
                eprintln!("Supported sources:");
                eprintln!("  vector: .geojson, .json, .kml, or .shp with .shx and .prj");
                eprintln!("  raster: .tif/.tiff with GeoKeys, or .png/.jpg with a world file and .prj");
            }
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidLayer(e) => write!(f, "{}", e),
            CliError::InvalidZoom { min, max } => {
                write!(f, "--min-zoom ({}) must not exceed --max-zoom ({})", min, max)
            }
            CliError::CurrentDir(e) => write!(f, "Cannot resolve current directory: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Orchestrator(e) => write!(f, "{}", e),
            CliError::Service(e) => write!(f, "{}", e),
            CliError::Job(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::InvalidLayer(e) => Some(e),
            CliError::CurrentDir(e) | CliError::Runtime(e) => Some(e),
            CliError::Orchestrator(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::Job(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<OrchestratorError> for CliError {
    fn from(e: OrchestratorError) -> Self {
        CliError::Orchestrator(e)
    }
}

impl From<InvalidLayerId> for CliError {
    fn from(e: InvalidLayerId) -> Self {
        CliError::InvalidLayer(e)
    }
}

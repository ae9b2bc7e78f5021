//! Configuration
//!
//! [`ConfigFile`] is the user-facing INI file; [`StorageConfig`] is the
//! explicit storage layout handed to the orchestrator.

mod file;
mod storage;

pub use file::{
    config_file_path, expand_tilde, ConfigFile, ConfigFileError, LoggingSettings,
    StorageSettings, TilingSettings,
};
pub use storage::StorageConfig;

use std::path::PathBuf;

/// Default number of jobs the service runs at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 1;

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "geopyramid.log";

/// Get the path to the config directory (~/.geopyramid).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geopyramid")
}

//! Configuration file handling for ~/.geopyramid/config.ini.
//!
//! Missing files and missing keys fall back to defaults; present values are
//! validated and rejected with the offending section, key and value.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::storage::StorageConfig;
use super::{config_directory, DEFAULT_LOG_FILE, DEFAULT_MAX_CONCURRENT_JOBS};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub upload_dir: PathBuf,
    pub tiles_dir: PathBuf,
}

/// `[tiling]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingSettings {
    /// Render workers per job, 0 for one per core
    pub threads: usize,
    pub max_concurrent_jobs: usize,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub tiling: TilingSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let base = config_directory();
        let storage = StorageConfig::default();
        Self {
            storage: StorageSettings {
                upload_dir: storage.upload_root,
                tiles_dir: storage.tiles_root,
            },
            tiling: TilingSettings {
                threads: 0,
                max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            },
            logging: LoggingSettings {
                directory: base.join("logs"),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Parses INI text, overlaying it on the defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigFileError::ReadError(ini::Error::Parse(e)))?;
        parse_ini(&ini)
    }

    /// Storage layout for the orchestrator.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.storage.upload_dir.clone(), self.storage.tiles_dir.clone())
    }

    /// INI rendering of the resolved configuration.
    pub fn to_config_string(&self) -> String {
        format!(
            r#"[storage]
; Relative source paths are resolved against this directory
upload_dir = {}
; Tiles are written to {{tiles_dir}}/{{layer}}/{{z}}/{{x}}/{{y}}.png
tiles_dir = {}

[tiling]
; Render threads per job (0 = all cores)
threads = {}
max_concurrent_jobs = {}

[logging]
directory = {}
file = {}
"#,
            path_to_string(&self.storage.upload_dir),
            path_to_string(&self.storage.tiles_dir),
            self.tiling.threads,
            self.tiling.max_concurrent_jobs,
            path_to_string(&self.logging.directory),
            self.logging.file,
        )
    }
}

/// Get the path to the config file (~/.geopyramid/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = non_empty(section.get("upload_dir")) {
            config.storage.upload_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("tiles_dir")) {
            config.storage.tiles_dir = expand_tilde(v);
        }
    }

    if let Some(section) = ini.section(Some("tiling")) {
        if let Some(v) = section.get("threads") {
            config.tiling.threads = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "tiling".to_string(),
                key: "threads".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (0 = all cores)".to_string(),
            })?;
        }
        if let Some(v) = section.get("max_concurrent_jobs") {
            config.tiling.max_concurrent_jobs = v
                .trim()
                .parse()
                .ok()
                .filter(|&n: &usize| n > 0)
                .ok_or_else(|| ConfigFileError::InvalidValue {
                    section: "tiling".to_string(),
                    key: "max_concurrent_jobs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer".to_string(),
                })?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(ConfigFileError::InvalidValue {
                    section: "logging".to_string(),
                    key: "file".to_string(),
                    value: v.to_string(),
                    reason: "must be a plain file name".to_string(),
                });
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Expands a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Collapses the home directory back to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.tiling.threads, 0);
        assert_eq!(config.tiling.max_concurrent_jobs, 1);
        assert_eq!(config.logging.file, "geopyramid.log");
    }

    #[test]
    fn test_values_overlay_defaults() {
        let config = ConfigFile::from_ini_str(
            "[storage]\ntiles_dir = /srv/tiles\n\n[tiling]\nthreads = 6\n",
        )
        .unwrap();
        assert_eq!(config.storage.tiles_dir, PathBuf::from("/srv/tiles"));
        assert_eq!(config.storage.upload_dir, ConfigFile::default().storage.upload_dir);
        assert_eq!(config.tiling.threads, 6);
        assert_eq!(config.storage().tiles_root, PathBuf::from("/srv/tiles"));
    }

    #[test]
    fn test_invalid_threads_names_key() {
        let err = ConfigFile::from_ini_str("[tiling]\nthreads = many\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "tiling");
                assert_eq!(key, "threads");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_concurrent_jobs_rejected() {
        let err = ConfigFile::from_ini_str("[tiling]\nmax_concurrent_jobs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "max_concurrent_jobs"));
    }

    #[test]
    fn test_log_file_must_be_plain_name() {
        assert!(ConfigFile::from_ini_str("[logging]\nfile = ../escape.log\n").is_err());
    }

    #[test]
    fn test_config_string_round_trips() {
        let mut config = ConfigFile::default();
        config.storage.tiles_dir = PathBuf::from("/var/lib/tiles");
        config.tiling.max_concurrent_jobs = 3;

        let reparsed = ConfigFile::from_ini_str(&config.to_config_string()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs/tiles"), PathBuf::from("/abs/tiles"));
    }
}

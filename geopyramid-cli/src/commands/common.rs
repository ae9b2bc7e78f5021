//! Helpers shared by subcommands.

use std::path::Path;

use geopyramid::config::ConfigFile;

use crate::error::CliError;

/// Loads the given config file, or the default one.
///
/// A missing file yields defaults; a malformed one is an error.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[tiling]\nthreads = lots\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(CliError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&temp.path().join("absent.ini"))).unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}

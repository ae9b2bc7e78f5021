//! `geopyramid config` - show the resolved configuration.

use std::path::PathBuf;

use clap::Args;
use geopyramid::config::config_file_path;

use super::common::load_config;
use crate::error::CliError;

/// Arguments for `geopyramid config`.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (defaults to ~/.geopyramid/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only print the configuration file path
    #[arg(long)]
    pub path: bool,
}

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let path = args.config.clone().unwrap_or_else(config_file_path);
    if args.path {
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config(Some(&path))?;
    if !path.exists() {
        println!("; {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_config_string());
    Ok(())
}

//! GeoPyramid CLI - Command-line interface
//!
//! Renders GeoJSON and georeferenced raster sources into web-mercator PNG
//! tile pyramids.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use commands::config::ConfigArgs;
use commands::tile::TileArgs;

#[derive(Parser)]
#[command(name = "geopyramid")]
#[command(version = geopyramid::VERSION)]
#[command(about = "Render web-mercator tile pyramids from vector and raster sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one source into {tiles_dir}/{layer}/{z}/{x}/{y}.png
    Tile(TileArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tile(args) => commands::tile::run(args),
        Commands::Config(args) => commands::config::run(args),
    };

    if let Err(e) = result {
        e.exit();
    }
}

//! CLI command implementations.
//!
//! - [`tile`] - Render a source into a tile pyramid
//! - [`config`] - Show the resolved configuration

pub mod common;
pub mod config;
pub mod tile;

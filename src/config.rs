//! Configuration management for the overlay tile server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `OVERLAY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `serve` - Run the HTTP tile server
//! - `plan` - Print the source tiles and footprints for one display tile
//!
//! # Environment Variables
//!
//! - `OVERLAY_CAPABILITIES` - Capabilities JSON file (required)
//! - `OVERLAY_CRS` - Source CRS: `web-mercator`, `geographic`, or a PROJ string
//! - `OVERLAY_MATRIX_SET` - Tile matrix set to serve (default: the layer's)
//! - `OVERLAY_DIVISION` - Mesh cells per source tile side, 1 to 256 (default: 8)
//! - `OVERLAY_BOUNDS_DIVISION` - Boundary samples per edge, 1 to 256 (default: 8)
//! - `OVERLAY_INSET_BORDER` - Inset UVs by one texel (default: true)
//! - `OVERLAY_INTERSECTION` - `overlap` or `corner-containment` (default: overlap)
//! - `OVERLAY_TILE_SIZE` - Display tile size in pixels (default: 512)
//! - `OVERLAY_MAX_ZOOM` - Deepest precomputed display zoom (default: 22)
//! - `OVERLAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `OVERLAY_PORT` - Server port (default: 3000)
//! - `OVERLAY_IMAGERY_ROOT` - Directory holding source tiles (required for serve)
//! - `OVERLAY_CHECKERBOARD` - Serve alternating solid-color tiles instead (default: false)
//! - `OVERLAY_POOL_SIZE` - Drawing surfaces (default: 2)
//! - `OVERLAY_CACHE_ENTRIES` - Cached tile plans (default: 4096)
//! - `OVERLAY_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `OVERLAY_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::imagery::{CheckerboardImagery, DirectoryImagery, ImagerySource};
use crate::mesh::{DEFAULT_DIVISION, MAX_DIVISION};
use crate::projection::Projector;
use crate::pyramid::IntersectionTest;
use crate::render::DEFAULT_POOL_SIZE;
use crate::tile::{
    SourceOptions, DEFAULT_MAX_ZOOM, DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_TILE_SIZE,
    MAX_DISPLAY_ZOOM,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default source CRS.
pub const DEFAULT_CRS: &str = "web-mercator";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// WMTS Overlay - reprojects a WMTS layer onto web Mercator XYZ tiles.
#[derive(Parser, Debug, Clone)]
#[command(name = "wmts-overlay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP tile server.
    Serve(ServeConfig),

    /// Print the plan for one display tile as JSON.
    Plan(PlanConfig),
}

// =============================================================================
// Source Arguments
// =============================================================================

/// Arguments describing the source layer, shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Capabilities JSON file.
    #[arg(long, env = "OVERLAY_CAPABILITIES")]
    pub capabilities: PathBuf,

    /// Source CRS: `web-mercator`, `geographic`, or a PROJ definition string
    /// (requires the `proj` feature).
    #[arg(long, default_value = DEFAULT_CRS, env = "OVERLAY_CRS")]
    pub crs: String,

    /// Tile matrix set to serve (defaults to the set linked by the layer).
    #[arg(long, env = "OVERLAY_MATRIX_SET")]
    pub matrix_set: Option<String>,

    /// Mesh cells per source tile side.
    #[arg(long, default_value_t = DEFAULT_DIVISION, env = "OVERLAY_DIVISION")]
    pub division: u32,

    /// Boundary samples per edge when reprojecting display tile bounds.
    #[arg(long, default_value_t = DEFAULT_DIVISION, env = "OVERLAY_BOUNDS_DIVISION")]
    pub bounds_division: u32,

    /// Inset texture coordinates by one texel to hide tile seams.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "OVERLAY_INSET_BORDER")]
    pub inset_border: bool,

    /// How source tiles are tested against the search rectangle.
    #[arg(long, value_enum, default_value_t = IntersectionTest::Overlap, env = "OVERLAY_INTERSECTION")]
    pub intersection: IntersectionTest,

    /// Display tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "OVERLAY_TILE_SIZE")]
    pub tile_size: u32,

    /// Deepest display zoom with a precomputed source level.
    #[arg(long, default_value_t = DEFAULT_MAX_ZOOM, env = "OVERLAY_MAX_ZOOM")]
    pub max_zoom: u8,
}

impl SourceArgs {
    /// Validate the source arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_DIVISION).contains(&self.division) {
            return Err(format!("division must be between 1 and {}", MAX_DIVISION));
        }
        if !(1..=MAX_DIVISION).contains(&self.bounds_division) {
            return Err(format!(
                "bounds_division must be between 1 and {}",
                MAX_DIVISION
            ));
        }
        if !(16..=4096).contains(&self.tile_size) {
            return Err("tile_size must be between 16 and 4096".to_string());
        }
        if self.max_zoom > MAX_DISPLAY_ZOOM {
            return Err(format!("max_zoom must be at most {}", MAX_DISPLAY_ZOOM));
        }
        self.projector().map(|_| ())
    }

    /// Build the projector named by `crs`.
    pub fn projector(&self) -> Result<Projector, String> {
        match self.crs.to_ascii_lowercase().as_str() {
            "web-mercator" | "epsg:3857" => Ok(Projector::web_mercator()),
            "geographic" | "epsg:4326" => Ok(Projector::identity()),
            _ => proj_projector(&self.crs),
        }
    }

    /// Library options for these arguments.
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            matrix_set: self.matrix_set.clone(),
            division: self.division,
            bounds_division: self.bounds_division,
            inset_border: self.inset_border,
            intersection_test: self.intersection,
            max_zoom: self.max_zoom,
            ..SourceOptions::default()
        }
    }
}

#[cfg(feature = "proj")]
fn proj_projector(definition: &str) -> Result<Projector, String> {
    Projector::from_proj_string(definition).map_err(|e| e.to_string())
}

#[cfg(not(feature = "proj"))]
fn proj_projector(definition: &str) -> Result<Projector, String> {
    Err(format!(
        "Unknown CRS '{}'. Use web-mercator or geographic, or build with the `proj` feature \
         for PROJ definition strings",
        definition
    ))
}

// =============================================================================
// Serve Command
// =============================================================================

/// Configuration for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Directory holding source tiles, addressed by the expanded URL template.
    #[arg(long, env = "OVERLAY_IMAGERY_ROOT", required_unless_present = "checkerboard")]
    pub imagery_root: Option<PathBuf>,

    /// Draw alternating solid-color tiles instead of reading imagery.
    #[arg(long, default_value_t = false, env = "OVERLAY_CHECKERBOARD")]
    pub checkerboard: bool,

    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "OVERLAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "OVERLAY_PORT")]
    pub port: u16,

    /// Number of drawing surfaces.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "OVERLAY_POOL_SIZE")]
    pub pool_size: usize,

    /// Maximum number of cached tile plans.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "OVERLAY_CACHE_ENTRIES")]
    pub cache_entries: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "OVERLAY_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "OVERLAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;

        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".to_string());
        }
        if self.cache_entries == 0 {
            return Err("cache_entries must be greater than 0".to_string());
        }
        self.imagery().map(|_| ())
    }

    /// Build the imagery source: checkerboard tiles or the imagery root.
    pub fn imagery(&self) -> Result<Arc<dyn ImagerySource>, String> {
        if self.checkerboard {
            return Ok(Arc::new(CheckerboardImagery));
        }
        match &self.imagery_root {
            Some(root) => Ok(Arc::new(DirectoryImagery::new(root.clone()))),
            None => Err("imagery_root is required unless checkerboard is set".to_string()),
        }
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Library options including pool and cache sizes.
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            pool_size: self.pool_size,
            cache_capacity: self.cache_entries,
            ..self.source.source_options()
        }
    }
}

// =============================================================================
// Plan Command
// =============================================================================

/// Configuration for the `plan` command.
#[derive(Args, Debug, Clone)]
pub struct PlanConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Display zoom.
    #[arg(short, long)]
    pub z: u8,

    /// Display column.
    #[arg(short, long)]
    pub x: u32,

    /// Display row.
    #[arg(short, long)]
    pub y: u32,

    /// Print only the GeoJSON footprint collection.
    #[arg(long, default_value_t = false)]
    pub geojson: bool,

    /// Add source tile center points to the GeoJSON output.
    #[arg(long, default_value_t = false, requires = "geojson")]
    pub centers: bool,
}

impl PlanConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

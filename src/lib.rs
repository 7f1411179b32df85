//! # WMTS Overlay
//!
//! Displays WMTS tiles published in a foreign map projection on a web
//! Mercator XYZ tile map.
//!
//! Source tiles are not reprojected pixel by pixel. Each one is subdivided
//! into a grid of triangles whose vertices are projected into the display
//! tile and drawn as a textured mesh, so only the vertices go through the
//! projection.
//!
//! ## Features
//!
//! - **Projection-agnostic search**: Finds the source tiles behind a display
//!   tile by reprojecting its sampled boundary
//! - **Zoom matching**: Picks the source level whose resolution best matches
//!   each display zoom, using the OGC pixel size or a pyramid's own scale
//! - **Mesh rendering**: Rasterizes textured triangle meshes into pooled
//!   drawing surfaces and encodes PNG tiles
//! - **Cancellation**: Unloading a tile discards any in-flight render of it
//! - **HTTP server**: Axum-based XYZ tile endpoint with debug footprints
//!
//! ## Architecture
//!
//! - [`geometry`] - Points, rectangles and boundary sampling
//! - [`projection`] - Forward/inverse projector pairs
//! - [`pyramid`] - Tile matrices, zoom table and intersection search
//! - [`mesh`] - Subdivided tile meshes
//! - [`capabilities`] - Layer description and URL templates
//! - [`imagery`] - Source tile fetching
//! - [`render`] - Surface pool and triangle rasterizer
//! - [`tile`] - Tile source, plan cache and encoding
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wmts_overlay::{
//!     create_router, DirectoryImagery, JsonFileCapabilities, Projector, RouterConfig,
//!     SourceOptions, TileSource, WebMercatorGrid,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(TileSource::new(
//!         Arc::new(JsonFileCapabilities::new("capabilities.json")),
//!         Arc::new(DirectoryImagery::new("tiles")),
//!         Projector::web_mercator(),
//!         Arc::new(WebMercatorGrid::default()),
//!         SourceOptions::default(),
//!     ));
//!
//!     let router = create_router(source, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod error;
pub mod geometry;
pub mod imagery;
pub mod mesh;
pub mod projection;
pub mod pyramid;
pub mod render;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use capabilities::{
    Capabilities, CapabilitiesProvider, JsonFileCapabilities, SourceLayer, StaticCapabilities,
    UrlTemplate,
};
pub use config::{Cli, Command, PlanConfig, ServeConfig, SourceArgs};
pub use error::{CapabilitiesError, ImageryError, ProjectionError, SourceError};
pub use geometry::{reproject_bounds, sample_rectangle_boundary, Point, Rectangle, RingClosure};
pub use imagery::{CheckerboardImagery, DirectoryImagery, ImagerySource};
pub use mesh::{build_mesh, DisplayFrame, MeshOptions, TileMesh, DEFAULT_DIVISION, MAX_DIVISION};
pub use projection::Projector;
pub use pyramid::{
    find_intersecting_tiles, IntersectionTest, PixelScale, SourceTileRef, TileMatrix,
    TilePyramid, ZoomTable,
};
pub use render::{draw_textured_mesh, PooledSurface, SurfacePool, DEFAULT_POOL_SIZE};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    DisplayGrid, PngTileEncoder, RenderedTile, SourceOptions, SourceStats, TileCache,
    TileMeshResult, TileOutcome, TileSource, ViewportTileKey, WebMercatorGrid,
};

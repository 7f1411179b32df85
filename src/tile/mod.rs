//! Display tile service layer.
//!
//! This module turns display tile requests into rendered images of the
//! source layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Host / HTTP Handlers            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileSource                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  PNG Encoder    │  │
//! │  │  (plans)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  Pyramid search · Mesh builder · Pool   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileSource`]: Main entry point, orchestrates the full pipeline
//! - [`DisplayGrid`] / [`WebMercatorGrid`]: Display tile geometry
//! - [`TileCache`]: LRU cache of tile plans keyed by [`ViewportTileKey`]
//! - [`TileMeshResult`]: Source tiles and meshes for one display tile
//! - [`PngTileEncoder`]: Encodes rendered surfaces

mod cache;
mod display;
mod encoder;
mod inflight;
mod plan;
mod service;

pub use cache::{TileCache, DEFAULT_TILE_CACHE_CAPACITY};
pub use display::{
    DisplayGrid, ViewportTileKey, WebMercatorGrid, DEFAULT_TILE_SIZE, MAX_DISPLAY_ZOOM,
};
pub use encoder::PngTileEncoder;
pub use plan::{footprint_polygon, PlannedTile, TileMeshResult};
pub use service::{
    LevelSummary, RenderedTile, SourceOptions, SourceStats, SourceSummary, TileOutcome,
    TileSource, DEFAULT_MAX_ZOOM,
};

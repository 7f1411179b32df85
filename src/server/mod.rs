//! HTTP server layer for the overlay tile source.
//!
//! Demonstrates the host contract over HTTP: a map client requests display
//! tiles by XYZ address and receives PNG images of the reprojected source.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                 GET /tiles/{z}/{x}/{y}.png                      │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │  (requests, errors)      │  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    debug_handler, health_handler, source_handler, stats_handler, tile_handler, unload_handler,
    ApiError, AppState, DebugPathParams, DebugQuery, ErrorResponse, HealthResponse,
    TilePathParams, CACHE_HIT_HEADER, SOURCE_TILES_HEADER,
};
pub use routes::{create_router, RouterConfig};

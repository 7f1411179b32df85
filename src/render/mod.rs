//! Rendering of planned display tiles.
//!
//! - [`SurfacePool`]: bounded, FIFO-fair pool of RGBA surfaces
//! - [`draw_textured_mesh`]: CPU rasterizer drawing a [`TileMesh`](crate::mesh::TileMesh)
//!   textured with one source tile

mod pool;
mod raster;

pub use pool::{PooledSurface, SurfacePool, DEFAULT_POOL_SIZE};
pub use raster::draw_textured_mesh;

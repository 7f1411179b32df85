//! Display tile grid.
//!
//! The map client addresses tiles with an XYZ scheme: zoom `z`, column `x`
//! from the antimeridian eastward and row `y` from the north edge
//! southward. [`DisplayGrid`] turns such an address into the geometry the
//! engine needs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::geometry::{Point, Rectangle};
use crate::projection::web_mercator::{
    lnglat_to_mercator, mercator_to_lnglat, EARTH_RADIUS, MAX_EXTENT,
};

/// Deepest display zoom whose tile indices fit in a `u32`.
pub const MAX_DISPLAY_ZOOM: u8 = 30;

/// Default display tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

// =============================================================================
// ViewportTileKey
// =============================================================================

/// Address of one display tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewportTileKey {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl ViewportTileKey {
    pub const fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Whether the address lies inside the XYZ grid at its zoom.
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_DISPLAY_ZOOM {
            return false;
        }
        let n = 1u32 << self.z;
        self.x < n && self.y < n
    }
}

impl fmt::Display for ViewportTileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

// =============================================================================
// DisplayGrid
// =============================================================================

/// Geometry of the display tile scheme.
///
/// Methods taking a key return `None` when the key is outside the grid.
pub trait DisplayGrid: Send + Sync {
    /// Tile edge in pixels.
    fn tile_size(&self) -> u32;

    /// Tile footprint in longitude/latitude degrees.
    fn tile_bounds(&self, key: ViewportTileKey) -> Option<Rectangle>;

    /// Tile footprint in display projected units.
    fn projected_bounds(&self, key: ViewportTileKey) -> Option<Rectangle>;

    /// Ground resolution at a zoom, in meters per pixel.
    fn meters_per_pixel(&self, zoom: u8) -> f64;

    /// Longitude/latitude to display projected units.
    fn forward(&self, lnglat: Point) -> Result<Point, ProjectionError>;
}

// =============================================================================
// WebMercatorGrid
// =============================================================================

/// Spherical web Mercator XYZ grid (EPSG:3857).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebMercatorGrid {
    tile_size: u32,
}

impl WebMercatorGrid {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
        }
    }
}

impl Default for WebMercatorGrid {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}

impl DisplayGrid for WebMercatorGrid {
    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn tile_bounds(&self, key: ViewportTileKey) -> Option<Rectangle> {
        let projected = self.projected_bounds(key)?;
        let sw = mercator_to_lnglat(projected.south_west());
        let ne = mercator_to_lnglat(projected.north_east());
        Rectangle::new(sw.x, sw.y, ne.x, ne.y)
    }

    fn projected_bounds(&self, key: ViewportTileKey) -> Option<Rectangle> {
        if !key.is_valid() {
            return None;
        }
        let span = 2.0 * MAX_EXTENT / f64::from(1u32 << key.z);
        let min_x = -MAX_EXTENT + span * f64::from(key.x);
        let max_y = MAX_EXTENT - span * f64::from(key.y);
        Rectangle::new(min_x, max_y - span, min_x + span, max_y)
    }

    fn meters_per_pixel(&self, zoom: u8) -> f64 {
        2.0 * std::f64::consts::PI * EARTH_RADIUS
            / (f64::from(self.tile_size) * 2f64.powi(i32::from(zoom)))
    }

    fn forward(&self, lnglat: Point) -> Result<Point, ProjectionError> {
        if !lnglat.is_finite() {
            return Err(ProjectionError::NonFinite {
                x: lnglat.x,
                y: lnglat.y,
            });
        }
        Ok(lnglat_to_mercator(lnglat))
    }
}

// =============================================================================
// Tests
// =============================================================================

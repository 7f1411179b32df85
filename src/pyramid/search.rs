//! Tile intersection search.
//!
//! Given a rectangle in source CRS units and one pyramid level, enumerate the
//! native tiles whose footprint intersects the rectangle. Tile rows grow
//! downward from the top-left corner, so row `j` covers
//! `[top - (j + 1) * len, top - j * len]` on the Y axis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{Point, Rectangle};

use super::{PixelScale, TileMatrix};

// =============================================================================
// IntersectionTest
// =============================================================================

/// How a tile footprint is tested against the search rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionTest {
    /// Interiors overlap on both axes. Never misses a tile.
    #[default]
    Overlap,

    /// Any footprint corner lies in the rectangle, half-open on the upper
    /// bounds. Misses tiles that straddle the rectangle without a corner
    /// inside it unless the caller pads the rectangle by a tile length.
    CornerContainment,
}

impl IntersectionTest {
    fn accepts(self, footprint: &Rectangle, clip: &Rectangle) -> bool {
        match self {
            IntersectionTest::Overlap => footprint.overlaps(clip),
            IntersectionTest::CornerContainment => [
                footprint.north_west(),
                footprint.north_east(),
                footprint.south_west(),
                footprint.south_east(),
            ]
            .into_iter()
            .any(|corner| clip.contains_half_open(corner)),
        }
    }
}

// =============================================================================
// SourceTileRef
// =============================================================================

/// One native tile selected from the source pyramid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTileRef {
    /// Column index (`{TileCol}`)
    pub col: u32,

    /// Row index (`{TileRow}`)
    pub row: u32,

    /// Tile matrix identifier (`{TileMatrix}`)
    pub matrix: Arc<str>,

    /// Tile footprint in source CRS units
    pub footprint: Rectangle,

    /// Tile width in pixels
    pub tile_width: u32,
}

impl SourceTileRef {
    /// Top-left corner of the footprint.
    pub fn top_left(&self) -> Point {
        self.footprint.north_west()
    }

    /// Side length of the footprint in source units.
    pub fn tile_length(&self) -> f64 {
        self.footprint.width()
    }
}

// =============================================================================
// Search
// =============================================================================

/// Enumerate the tiles of `matrix` that intersect `clip`.
///
/// Index bounds are clamped to the matrix, so a rectangle partly or entirely
/// outside the grid yields the in-grid subset or nothing. The result has no
/// guaranteed order.
pub fn find_intersecting_tiles(
    clip: &Rectangle,
    matrix: &TileMatrix,
    scale: &PixelScale,
    test: IntersectionTest,
) -> Vec<SourceTileRef> {
    let len = scale.tile_length(matrix);
    let top_left = matrix.top_left();

    let last_col = i64::from(matrix.matrix_width) - 1;
    let last_row = i64::from(matrix.matrix_height) - 1;

    let start_i = (((clip.min_x() - top_left.x) / len).floor() as i64).max(0);
    let end_i = (((clip.max_x() - top_left.x) / len).ceil() as i64).min(last_col);
    let start_j = (((top_left.y - clip.max_y()) / len).floor() as i64).max(0);
    let end_j = (((top_left.y - clip.min_y()) / len).ceil() as i64).min(last_row);

    if start_i > end_i || start_j > end_j {
        trace!(matrix = %matrix.identifier, "search rectangle outside tile matrix");
        return Vec::new();
    }

    let id: Arc<str> = Arc::from(matrix.identifier.as_str());
    let mut tiles = Vec::new();

    for i in start_i..=end_i {
        for j in start_j..=end_j {
            let x0 = top_left.x + len * i as f64;
            let y1 = top_left.y - len * j as f64;
            let Some(footprint) = Rectangle::new(x0, y1 - len, x0 + len, y1) else {
                continue;
            };

            if test.accepts(&footprint, clip) {
                tiles.push(SourceTileRef {
                    col: i as u32,
                    row: j as u32,
                    matrix: Arc::clone(&id),
                    footprint,
                    tile_width: matrix.tile_width,
                });
            }
        }
    }

    tiles
}

// =============================================================================
// Tests
// =============================================================================

//! Source tile pyramid and zoom resolution.
//!
//! A WMTS tile matrix set describes each zoom level by a scale denominator,
//! a top-left corner and a grid size. The ground resolution of a level is
//! `scale_denominator * standardized_pixel_size`, with the OGC standardized
//! rendering pixel size of 0.28 mm unless the set says otherwise.
//!
//! # Ordering
//!
//! Capabilities documents usually list levels coarse to fine, but nothing
//! forces them to. [`TilePyramid::new`] accepts either direction as long as
//! the scale denominators are strictly monotonic, and always stores levels
//! coarse to fine.

mod search;

pub use search::{find_intersecting_tiles, IntersectionTest, SourceTileRef};

use serde::{Deserialize, Serialize};

use crate::error::CapabilitiesError;
use crate::geometry::Point;

/// OGC WMTS standardized rendering pixel size, in meters.
pub const STANDARDIZED_PIXEL_SIZE: f64 = 0.00028;

// =============================================================================
// TileMatrix
// =============================================================================

/// One level of a tile pyramid, as declared by the capabilities document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrix {
    /// Identifier substituted for `{TileMatrix}` in tile URLs
    pub identifier: String,

    /// Map scale denominator of this level
    pub scale_denominator: f64,

    /// Top-left corner of the grid in source CRS units, `[x, y]`
    pub top_left_corner: [f64; 2],

    /// Tile width in pixels (tiles are square)
    pub tile_width: u32,

    /// Number of tile columns
    pub matrix_width: u32,

    /// Number of tile rows
    pub matrix_height: u32,
}

impl TileMatrix {
    /// Top-left corner as a point.
    pub fn top_left(&self) -> Point {
        Point::new(self.top_left_corner[0], self.top_left_corner[1])
    }

    fn validate(&self) -> Result<(), CapabilitiesError> {
        let invalid = |field, value| CapabilitiesError::InvalidValue {
            matrix: self.identifier.clone(),
            field,
            value,
        };

        if !(self.scale_denominator.is_finite() && self.scale_denominator > 0.0) {
            return Err(invalid("scaleDenominator", self.scale_denominator));
        }
        if self.tile_width == 0 {
            return Err(invalid("tileWidth", 0.0));
        }
        if self.matrix_width == 0 {
            return Err(invalid("matrixWidth", 0.0));
        }
        if self.matrix_height == 0 {
            return Err(invalid("matrixHeight", 0.0));
        }
        for &v in &self.top_left_corner {
            if !v.is_finite() {
                return Err(invalid("topLeftCorner", v));
            }
        }
        Ok(())
    }
}

// =============================================================================
// PixelScale
// =============================================================================

/// Conversion from scale denominators to ground and CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PixelScale {
    /// Physical size of one rendered pixel, in meters
    pub standardized_pixel_size: f64,

    /// Meters per source CRS unit (1.0 for metric grids)
    pub meters_per_unit: f64,
}

impl Default for PixelScale {
    fn default() -> Self {
        Self {
            standardized_pixel_size: STANDARDIZED_PIXEL_SIZE,
            meters_per_unit: 1.0,
        }
    }
}

impl PixelScale {
    /// Nominal ground resolution of a level, in meters per pixel.
    pub fn resolution(&self, matrix: &TileMatrix) -> f64 {
        matrix.scale_denominator * self.standardized_pixel_size
    }

    /// Side length of one tile, in source CRS units.
    pub fn tile_length(&self, matrix: &TileMatrix) -> f64 {
        self.resolution(matrix) * f64::from(matrix.tile_width) / self.meters_per_unit
    }

    fn validate(&self, set: &str) -> Result<(), CapabilitiesError> {
        for (field, value) in [
            ("standardizedPixelSize", self.standardized_pixel_size),
            ("metersPerUnit", self.meters_per_unit),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CapabilitiesError::InvalidValue {
                    matrix: set.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// TilePyramid
// =============================================================================

/// Validated tile pyramid, stored coarse to fine.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePyramid {
    identifier: String,
    matrices: Vec<TileMatrix>,
    scale: PixelScale,
}

impl TilePyramid {
    /// Validate and normalize a pyramid.
    ///
    /// # Errors
    ///
    /// Fails if there are no levels, any level has a non-positive or
    /// non-finite value, or scale denominators are not strictly monotonic.
    pub fn new(
        identifier: impl Into<String>,
        mut matrices: Vec<TileMatrix>,
        scale: PixelScale,
    ) -> Result<Self, CapabilitiesError> {
        let identifier = identifier.into();

        if matrices.is_empty() {
            return Err(CapabilitiesError::EmptyPyramid(identifier));
        }
        scale.validate(&identifier)?;
        for matrix in &matrices {
            matrix.validate()?;
        }

        if matrices.len() > 1 {
            let descending = matrices[0].scale_denominator > matrices[1].scale_denominator;
            for pair in matrices.windows(2) {
                let ordered = if descending {
                    pair[0].scale_denominator > pair[1].scale_denominator
                } else {
                    pair[0].scale_denominator < pair[1].scale_denominator
                };
                if !ordered {
                    return Err(CapabilitiesError::NonMonotonicScales {
                        set: identifier,
                        matrix: pair[1].identifier.clone(),
                    });
                }
            }
            if !descending {
                matrices.reverse();
            }
        }

        Ok(Self {
            identifier,
            matrices,
            scale,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn scale(&self) -> &PixelScale {
        &self.scale
    }

    /// Levels ordered coarse to fine.
    pub fn matrices(&self) -> &[TileMatrix] {
        &self.matrices
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TileMatrix> {
        self.matrices.get(index)
    }

    pub fn coarsest(&self) -> &TileMatrix {
        &self.matrices[0]
    }

    pub fn finest(&self) -> &TileMatrix {
        &self.matrices[self.matrices.len() - 1]
    }

    /// Index of the level to use for a display resolution.
    ///
    /// Levels are walked coarse to fine and the first one whose resolution
    /// is at or below `target_meters_per_pixel` wins, so the display is never
    /// fed less detail than it asks for. If even the finest level is too
    /// coarse, the finest is returned.
    pub fn resolve_zoom_index(&self, target_meters_per_pixel: f64) -> usize {
        self.matrices
            .iter()
            .position(|m| self.scale.resolution(m) <= target_meters_per_pixel)
            .unwrap_or(self.matrices.len() - 1)
    }

    /// Level to use for a display resolution. See [`Self::resolve_zoom_index`].
    pub fn resolve_zoom(&self, target_meters_per_pixel: f64) -> &TileMatrix {
        &self.matrices[self.resolve_zoom_index(target_meters_per_pixel)]
    }
}

// =============================================================================
// ZoomTable
// =============================================================================

/// Precomputed mapping from display zoom to source level index.
///
/// The resolver is pure over a fixed pyramid, so the table is built once per
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomTable {
    levels: Vec<usize>,
}

impl ZoomTable {
    /// Resolve every display zoom in `0..=max_zoom`.
    ///
    /// `meters_per_pixel` gives the display ground resolution at a zoom.
    pub fn build<F>(pyramid: &TilePyramid, max_zoom: u8, meters_per_pixel: F) -> Self
    where
        F: Fn(u8) -> f64,
    {
        let levels = (0..=max_zoom)
            .map(|z| pyramid.resolve_zoom_index(meters_per_pixel(z)))
            .collect();
        Self { levels }
    }

    /// Source level index for a display zoom, `None` above the max zoom.
    pub fn get(&self, zoom: u8) -> Option<usize> {
        self.levels.get(zoom as usize).copied()
    }

    pub fn max_zoom(&self) -> u8 {
        (self.levels.len() - 1) as u8
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Tile mesh construction.
//!
//! A source tile is a square in the source CRS but an irregular quadrilateral
//! with curved edges once reprojected into the display. Instead of warping
//! every pixel, the tile is split into a `division × division` grid, each
//! grid corner is projected once, and every cell becomes two textured
//! triangles. The positional error is bounded by the curvature of the
//! projection inside one cell.
//!
//! # Layout
//!
//! Grid corner `(i, j)` is column `i` from the left and row `j` from the top
//! of the tile. For every cell the two triangles are `(BL, TR, BR)` and
//! `(BL, TR, TL)`, so all cells share the same bottom-left to top-right
//! diagonal.

use crate::error::ProjectionError;
use crate::geometry::{Point, Rectangle};
use crate::pyramid::SourceTileRef;

/// Default number of cells per tile side.
pub const DEFAULT_DIVISION: u32 = 8;

/// Largest number of cells per tile side. Larger divisions are clamped.
pub const MAX_DIVISION: u32 = 256;

// =============================================================================
// Frame and options
// =============================================================================

/// The display tile a mesh is built for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFrame {
    /// Display tile footprint in display projected units
    pub bounds: Rectangle,

    /// Display tile size in pixels
    pub size: u32,
}

impl DisplayFrame {
    /// Map a display projected coordinate to tile-local pixels, origin at the
    /// top-left, Y down.
    pub fn to_local(&self, p: Point) -> [f32; 2] {
        let size = f64::from(self.size);
        let x = (p.x - self.bounds.min_x()) / self.bounds.width() * size;
        let y = size - (p.y - self.bounds.min_y()) / self.bounds.height() * size;
        [x as f32, y as f32]
    }
}

/// Mesh construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshOptions {
    /// Cells per tile side; 0 is treated as 1
    pub division: u32,

    /// Shrink UVs by one texel on each side to hide hard tile borders
    pub inset_border: bool,

    /// Part of the source CRS actually covered by imagery
    pub valid_data: Option<Rectangle>,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            division: DEFAULT_DIVISION,
            inset_border: true,
            valid_data: None,
        }
    }
}

// =============================================================================
// TileMesh
// =============================================================================

/// Triangle list for one source tile.
///
/// `positions[k]` and `uvs[k]` describe the same vertex; every three
/// consecutive vertices form a triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMesh {
    /// Display-tile-local pixel coordinates
    pub positions: Vec<[f32; 2]>,

    /// Texture coordinates in `[0, 1]²`, V down
    pub uvs: Vec<[f32; 2]>,
}

impl TileMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate triangles as `(positions, uvs)`.
    pub fn triangles(&self) -> impl Iterator<Item = ([[f32; 2]; 3], [[f32; 2]; 3])> + '_ {
        self.positions
            .chunks_exact(3)
            .zip(self.uvs.chunks_exact(3))
            .map(|(p, t)| ([p[0], p[1], p[2]], [t[0], t[1], t[2]]))
    }

    /// Smallest and largest U and V over all vertices.
    pub fn uv_range(&self) -> Option<([f32; 2], [f32; 2])> {
        let first = *self.uvs.first()?;
        Some(self.uvs.iter().fold((first, first), |(lo, hi), uv| {
            (
                [lo[0].min(uv[0]), lo[1].min(uv[1])],
                [hi[0].max(uv[0]), hi[1].max(uv[1])],
            )
        }))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Build the mesh of one source tile for one display tile.
///
/// `to_display` maps source CRS coordinates to display projected
/// coordinates (the source inverse projection followed by the display
/// forward projection).
///
/// Returns `Ok(None)` when `options.valid_data` does not overlap the tile.
///
/// # Errors
///
/// Returns the first projection error raised by `to_display`.
pub fn build_mesh<F>(
    tile: &SourceTileRef,
    options: &MeshOptions,
    to_display: F,
    frame: &DisplayFrame,
) -> Result<Option<TileMesh>, ProjectionError>
where
    F: Fn(Point) -> Result<Point, ProjectionError>,
{
    let footprint = tile.footprint;
    let len = tile.tile_length();

    // Area to cover and the matching window of the texture
    let (area, [u0, u1, v0, v1]) = match options.valid_data {
        None => (footprint, [0.0, 1.0, 0.0, 1.0]),
        Some(valid) => match footprint.intersection(&valid) {
            None => return Ok(None),
            Some(area) => (
                area,
                [
                    (area.min_x() - footprint.min_x()) / len,
                    (area.max_x() - footprint.min_x()) / len,
                    (footprint.max_y() - area.max_y()) / len,
                    (footprint.max_y() - area.min_y()) / len,
                ],
            ),
        },
    };

    let division = options.division.clamp(1, MAX_DIVISION) as usize;
    let d = division as f64;
    let stride = division + 1;

    let inset = |t: f64| -> f64 {
        let w = f64::from(tile.tile_width);
        if options.inset_border && w > 2.0 {
            t * (w - 2.0) / w + 1.0 / w
        } else {
            t
        }
    };

    // Project every grid corner once
    let top = Point::new(area.min_x(), area.max_y());
    let mut corners = Vec::with_capacity(stride * stride);
    for j in 0..stride {
        let fy = j as f64 / d;
        for i in 0..stride {
            let fx = i as f64 / d;
            let source = Point::new(top.x + area.width() * fx, top.y - area.height() * fy);
            let position = frame.to_local(to_display(source)?);
            let uv = [
                inset(u0 + (u1 - u0) * fx) as f32,
                inset(v0 + (v1 - v0) * fy) as f32,
            ];
            corners.push((position, uv));
        }
    }

    let vertices = division * division * 6;
    let mut mesh = TileMesh {
        positions: Vec::with_capacity(vertices),
        uvs: Vec::with_capacity(vertices),
    };

    let corner = |i: usize, j: usize| corners[j * stride + i];
    for i in 0..division {
        for j in 0..division {
            let tl = corner(i, j);
            let tr = corner(i + 1, j);
            let bl = corner(i, j + 1);
            let br = corner(i + 1, j + 1);

            for (position, uv) in [bl, tr, br, bl, tr, tl] {
                mesh.positions.push(position);
                mesh.uvs.push(uv);
            }
        }
    }

    Ok(Some(mesh))
}

// =============================================================================
// Tests
// =============================================================================

//! Boundary sampling and bounding-box reprojection.
//!
//! A non-linear projection does not map a rectangle onto a rectangle, so the
//! reprojected extent of a rectangle is estimated by walking its boundary,
//! projecting each sample and taking the bounding box of the result.

use crate::error::ProjectionError;

use super::rect::{Point, Rectangle};

/// Whether a sampled ring repeats its first point at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingClosure {
    /// First and last points are equal (`4 * division + 1` points).
    Closed,
    /// The trailing duplicate is omitted (`4 * division` points).
    Open,
}

/// Sample the boundary of `rect` as an ordered ring.
///
/// The walk starts at the south-west corner and visits south-east,
/// north-east and north-west before returning south-west. Each edge is split
/// into `division` segments (`t = i / division`). A `division` of 0 is
/// treated as 1, which yields just the four corners.
pub fn sample_rectangle_boundary(
    rect: &Rectangle,
    division: u32,
    closure: RingClosure,
) -> Vec<Point> {
    let division = division.max(1);
    let corners = [
        rect.south_west(),
        rect.south_east(),
        rect.north_east(),
        rect.north_west(),
        rect.south_west(),
    ];

    let mut ring = Vec::with_capacity(4 * division as usize + 1);
    ring.push(corners[0]);

    for edge in corners.windows(2) {
        for i in 1..=division {
            let t = f64::from(i) / f64::from(division);
            ring.push(edge[0].lerp(edge[1], t));
        }
    }

    // The last interpolated point is the start corner itself
    if closure == RingClosure::Open {
        ring.pop();
    }

    ring
}

/// Reproject `rect` with `forward` and return the bounding box of the result.
///
/// The returned rectangle contains every projected boundary sample, so tile
/// searches against it over-select near the edges rather than miss tiles.
///
/// # Errors
///
/// Returns an error if any sample fails to project, projects to a
/// non-finite value, or the projected samples collapse to zero area.
pub fn reproject_bounds<F>(
    rect: &Rectangle,
    division: u32,
    forward: F,
) -> Result<Rectangle, ProjectionError>
where
    F: Fn(Point) -> Result<Point, ProjectionError>,
{
    let samples = sample_rectangle_boundary(rect, division, RingClosure::Open);

    let mut projected = Vec::with_capacity(samples.len());
    for p in samples {
        let q = forward(p)?;
        if !q.is_finite() {
            return Err(ProjectionError::NonFinite { x: p.x, y: p.y });
        }
        projected.push(q);
    }

    Rectangle::bounding(projected).ok_or(ProjectionError::Degenerate)
}

// =============================================================================
// Tests
// =============================================================================

//! Planar geometry primitives and boundary reprojection.
//!
//! - [`Point`] and [`Rectangle`]: plain coordinate values
//! - [`sample_rectangle_boundary`]: densify a rectangle's outline
//! - [`reproject_bounds`]: conservative bounding box of a reprojected rectangle

mod rect;
mod sampling;

pub use rect::{Point, Rectangle};
pub use sampling::{reproject_bounds, sample_rectangle_boundary, RingClosure};

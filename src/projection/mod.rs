//! Coordinate reference system projectors.
//!
//! A [`Projector`] is a capability value: a pair of pure functions converting
//! between geographic longitude/latitude (degrees) and the planar units of
//! one source CRS. The engine never looks projections up by name; callers
//! build the projector they need and hand it to the tile source.
//!
//! ```
//! use wmts_overlay::geometry::Point;
//! use wmts_overlay::projection::Projector;
//!
//! let merc = Projector::web_mercator();
//! let p = merc.forward(Point::new(-0.1276, 51.5072)).unwrap();
//! let back = merc.inverse(p).unwrap();
//! assert!((back.y - 51.5072).abs() < 1e-9);
//! ```

#[cfg(feature = "proj")]
mod proj;
pub mod web_mercator;

use std::fmt;
use std::sync::Arc;

use crate::error::ProjectionError;
use crate::geometry::Point;

/// Signature of a single projection direction.
pub type ProjectFn = dyn Fn(Point) -> Result<Point, ProjectionError> + Send + Sync;

// =============================================================================
// Projector
// =============================================================================

/// Forward/inverse projection pair between longitude/latitude and a source
/// CRS.
///
/// Cloning is cheap; both directions are reference counted.
#[derive(Clone)]
pub struct Projector {
    name: Arc<str>,
    forward: Arc<ProjectFn>,
    inverse: Arc<ProjectFn>,
}

impl Projector {
    /// Build a projector from two closures.
    ///
    /// `forward` maps longitude/latitude to source units, `inverse` maps
    /// source units back to longitude/latitude. Both must be pure.
    pub fn new<F, I>(name: impl Into<Arc<str>>, forward: F, inverse: I) -> Self
    where
        F: Fn(Point) -> Result<Point, ProjectionError> + Send + Sync + 'static,
        I: Fn(Point) -> Result<Point, ProjectionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            forward: Arc::new(forward),
            inverse: Arc::new(inverse),
        }
    }

    /// Source CRS that is itself longitude/latitude.
    pub fn identity() -> Self {
        Self::new("geographic", |p| Ok(p), |p| Ok(p))
    }

    /// Source CRS in spherical web Mercator (EPSG:3857).
    pub fn web_mercator() -> Self {
        Self::new(
            "web-mercator",
            |p| Ok(web_mercator::lnglat_to_mercator(p)),
            |p| Ok(web_mercator::mercator_to_lnglat(p)),
        )
    }

    /// Name given at construction, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Longitude/latitude to source CRS.
    pub fn forward(&self, p: Point) -> Result<Point, ProjectionError> {
        (self.forward)(p)
    }

    /// Source CRS to longitude/latitude.
    pub fn inverse(&self, p: Point) -> Result<Point, ProjectionError> {
        (self.inverse)(p)
    }
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

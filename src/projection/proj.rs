//! Projectors backed by `proj4rs` for arbitrary source CRS definitions.

use std::sync::Arc;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::ProjectionError;
use crate::geometry::Point;

use super::Projector;

/// PROJ definition of WGS84 longitude/latitude, the display-side CRS.
pub const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

fn parse(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition)
        .map_err(|e| ProjectionError::Backend(format!("invalid projection '{definition}': {e:?}")))
}

/// One direction of a proj4rs transform, with degree/radian handling.
struct Transform {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
}

impl Transform {
    fn apply(&self, p: Point) -> Result<Point, ProjectionError> {
        let (x, y) = if self.from_geographic {
            (p.x.to_radians(), p.y.to_radians())
        } else {
            (p.x, p.y)
        };

        let mut point = (x, y, 0.0);
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| ProjectionError::Backend(format!("{e:?}")))?;

        let out = if self.to_geographic {
            Point::new(point.0.to_degrees(), point.1.to_degrees())
        } else {
            Point::new(point.0, point.1)
        };

        if !out.is_finite() {
            return Err(ProjectionError::NonFinite { x: p.x, y: p.y });
        }
        Ok(out)
    }
}

impl Projector {
    /// Build a projector between WGS84 longitude/latitude and the CRS given
    /// by a PROJ definition string (e.g. `+proj=tmerc ...` for a national
    /// grid).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Backend`] if the definition cannot be
    /// parsed.
    pub fn from_proj_string(definition: &str) -> Result<Self, ProjectionError> {
        let source_geographic = is_geographic(definition);

        let forward = Arc::new(Transform {
            from: parse(WGS84_PROJ)?,
            to: parse(definition)?,
            from_geographic: true,
            to_geographic: source_geographic,
        });
        let inverse = Arc::new(Transform {
            from: parse(definition)?,
            to: parse(WGS84_PROJ)?,
            from_geographic: source_geographic,
            to_geographic: true,
        });

        Ok(Projector::new(
            definition.to_string(),
            move |p| forward.apply(p),
            move |p| inverse.apply(p),
        ))
    }
}

//! Planned display tiles.
//!
//! A plan is everything needed to render one display tile: the source tiles
//! that cover it, their URLs, and their meshes. Plans are immutable once
//! built and shared through the cache as `Arc<TileMeshResult>`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ProjectionError;
use crate::geometry::{sample_rectangle_boundary, Point, RingClosure};
use crate::mesh::TileMesh;
use crate::pyramid::SourceTileRef;

use super::display::ViewportTileKey;

/// One source tile scheduled for drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTile {
    pub source: SourceTileRef,

    /// Expanded tile URL
    pub url: String,

    /// Closed footprint ring in longitude/latitude
    pub outline: Vec<Point>,

    #[serde(skip)]
    pub mesh: TileMesh,
}

impl PlannedTile {
    /// Center of the outline's longitude/latitude bounding box.
    ///
    /// `None` when the outline could not be projected.
    pub fn center(&self) -> Option<Point> {
        let first = self.outline.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &self.outline[1..] {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Point::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0))
    }

    fn properties(&self, kind: &str) -> Value {
        json!({
            "kind": kind,
            "x": self.source.col,
            "y": self.source.row,
            "z": &*self.source.matrix,
            "url": self.url,
        })
    }
}

/// Source tiles and meshes for one display tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMeshResult {
    pub key: ViewportTileKey,

    /// Source matrix searched, `None` when the tile is outside the layer
    pub matrix: Option<Arc<str>>,

    pub tiles: Vec<PlannedTile>,
}

impl TileMeshResult {
    /// Plan with nothing to draw.
    pub fn empty(key: ViewportTileKey) -> Self {
        Self {
            key,
            matrix: None,
            tiles: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Total triangles over all meshes.
    pub fn triangle_count(&self) -> usize {
        self.tiles.iter().map(|t| t.mesh.triangle_count()).sum()
    }

    /// Source tile footprints as a GeoJSON `FeatureCollection`.
    ///
    /// Each feature is a polygon labelled with the source column (`x`), row
    /// (`y`) and tile matrix (`z`), with `kind` set to `"footprint"`.
    pub fn footprints_geojson(&self) -> Value {
        self.debug_geojson(false)
    }

    /// Footprints, optionally followed by one `"center"` point per tile
    /// carrying the same labels.
    pub fn debug_geojson(&self, centers: bool) -> Value {
        let mut features: Vec<Value> = self
            .tiles
            .iter()
            .map(|tile| {
                let ring: Vec<[f64; 2]> = tile.outline.iter().map(|p| [p.x, p.y]).collect();
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [ring],
                    },
                    "properties": tile.properties("footprint"),
                })
            })
            .collect();

        if centers {
            features.extend(self.tiles.iter().filter_map(|tile| {
                let center = tile.center()?;
                Some(json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [center.x, center.y],
                    },
                    "properties": tile.properties("center"),
                }))
            }));
        }

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

/// Closed ring around a source tile in longitude/latitude.
///
/// `inverse` maps source CRS units to longitude/latitude.
pub fn footprint_polygon<F>(
    tile: &SourceTileRef,
    division: u32,
    inverse: F,
) -> Result<Vec<Point>, ProjectionError>
where
    F: Fn(Point) -> Result<Point, ProjectionError>,
{
    sample_rectangle_boundary(&tile.footprint, division, RingClosure::Closed)
        .into_iter()
        .map(inverse)
        .collect()
}

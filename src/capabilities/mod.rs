//! Source capabilities.
//!
//! The engine does not parse WMTS XML. A [`CapabilitiesProvider`] hands it a
//! pre-parsed [`Capabilities`] value: one layer and the tile matrix sets it
//! may be served in. [`Capabilities::resolve`] validates that value into a
//! [`SourceLayer`], the only form the rest of the crate consumes.
//!
//! # JSON form
//!
//! ```json
//! {
//!   "layer": {
//!     "identifier": "Road_27700",
//!     "wgs84BoundingBox": [-10.76, 49.53, 1.77, 61.33],
//!     "validDataBounds": [0, 0, 700000, 1300000],
//!     "tileUrlTemplate": "tiles/{TileMatrix}/{TileRow}/{TileCol}.png",
//!     "tileMatrixSet": "EPSG:27700"
//!   },
//!   "tileMatrixSets": [
//!     {
//!       "identifier": "EPSG:27700",
//!       "supportedCrs": "EPSG:27700",
//!       "tileMatrices": [
//!         {
//!           "identifier": "EPSG:27700:0",
//!           "scaleDenominator": 3492187.5,
//!           "topLeftCorner": [-238375.0, 1376256.0],
//!           "tileWidth": 256,
//!           "matrixWidth": 5,
//!           "matrixHeight": 7
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

mod template;

pub use template::UrlTemplate;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CapabilitiesError;
use crate::geometry::Rectangle;
use crate::pyramid::{PixelScale, TileMatrix, TilePyramid};

// =============================================================================
// Document types
// =============================================================================

/// Pre-parsed capabilities of one source layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub layer: LayerInfo,

    #[serde(default)]
    pub tile_matrix_sets: Vec<TileMatrixSetInfo>,
}

/// Layer description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Layer coverage in longitude/latitude degrees
    #[serde(rename = "wgs84BoundingBox")]
    pub wgs84_bounding_box: Rectangle,

    /// Area of the source CRS that actually holds imagery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_data_bounds: Option<Rectangle>,

    /// RESTful tile URL with `{TileMatrix}`, `{TileRow}`, `{TileCol}`
    pub tile_url_template: String,

    /// Linked tile matrix set, first declared set if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_matrix_set: Option<String>,
}

/// One tile matrix set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixSetInfo {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_crs: Option<String>,

    #[serde(default)]
    pub pixel_scale: PixelScale,

    pub tile_matrices: Vec<TileMatrix>,
}

impl Capabilities {
    /// Parse the JSON form.
    pub fn from_json(text: &str) -> Result<Self, CapabilitiesError> {
        serde_json::from_str(text).map_err(|e| CapabilitiesError::Parse(e.to_string()))
    }

    /// Validate into a servable layer.
    ///
    /// `matrix_set` overrides the set linked by the layer.
    ///
    /// # Errors
    ///
    /// Fails if no matching tile matrix set exists, the pyramid is invalid,
    /// or the URL template lacks a placeholder.
    pub fn resolve(&self, matrix_set: Option<&str>) -> Result<SourceLayer, CapabilitiesError> {
        let wanted = matrix_set.or(self.layer.tile_matrix_set.as_deref());

        let set = match wanted {
            Some(id) => self
                .tile_matrix_sets
                .iter()
                .find(|s| s.identifier == id)
                .ok_or_else(|| CapabilitiesError::UnknownTileMatrixSet(id.to_string()))?,
            None => self
                .tile_matrix_sets
                .first()
                .ok_or(CapabilitiesError::NoTileMatrixSet)?,
        };

        let pyramid = TilePyramid::new(
            set.identifier.clone(),
            set.tile_matrices.clone(),
            set.pixel_scale,
        )?;
        let template = UrlTemplate::parse(self.layer.tile_url_template.clone())?;

        debug!(
            layer = %self.layer.identifier,
            matrix_set = %set.identifier,
            levels = pyramid.len(),
            "Resolved capabilities"
        );

        Ok(SourceLayer {
            identifier: self.layer.identifier.clone(),
            wgs84_bounds: self.layer.wgs84_bounding_box,
            valid_data: self.layer.valid_data_bounds,
            template,
            pyramid,
        })
    }
}

// =============================================================================
// SourceLayer
// =============================================================================

/// A validated layer ready to be served.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLayer {
    pub identifier: String,

    /// Coverage in longitude/latitude; display tiles are clipped to it
    pub wgs84_bounds: Rectangle,

    /// Imagery extent in source CRS units
    pub valid_data: Option<Rectangle>,

    pub template: UrlTemplate,

    pub pyramid: TilePyramid,
}

// =============================================================================
// Providers
// =============================================================================

/// Supplies capabilities to a tile source.
///
/// Called once per source lifetime; failures are retried on the next
/// request.
#[async_trait]
pub trait CapabilitiesProvider: Send + Sync {
    async fn load(&self) -> Result<Capabilities, CapabilitiesError>;
}

/// Capabilities known up front.
#[derive(Debug, Clone)]
pub struct StaticCapabilities {
    capabilities: Capabilities,
}

impl StaticCapabilities {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }
}

#[async_trait]
impl CapabilitiesProvider for StaticCapabilities {
    async fn load(&self) -> Result<Capabilities, CapabilitiesError> {
        Ok(self.capabilities.clone())
    }
}

/// Capabilities read from a JSON file on each load.
#[derive(Debug, Clone)]
pub struct JsonFileCapabilities {
    path: PathBuf,
}

impl JsonFileCapabilities {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CapabilitiesProvider for JsonFileCapabilities {
    async fn load(&self) -> Result<Capabilities, CapabilitiesError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CapabilitiesError::Io {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        Capabilities::from_json(&text)
    }
}

// =============================================================================
// Tests
// =============================================================================

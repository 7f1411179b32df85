//! Test utilities for integration tests.
//!
//! This module provides synthetic capabilities, mock imagery sources and
//! helpers for building tile sources and routers around them.

use async_trait::async_trait;
use axum::Router;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use wmts_overlay::capabilities::{
    Capabilities, CapabilitiesProvider, LayerInfo, StaticCapabilities, TileMatrixSetInfo,
};
use wmts_overlay::error::{CapabilitiesError, ImageryError};
use wmts_overlay::geometry::Rectangle;
use wmts_overlay::imagery::ImagerySource;
use wmts_overlay::projection::Projector;
use wmts_overlay::pyramid::{PixelScale, SourceTileRef, TileMatrix, STANDARDIZED_PIXEL_SIZE};
use wmts_overlay::tile::{SourceOptions, TileSource, WebMercatorGrid};
use wmts_overlay::{create_router, RouterConfig};

/// Display tile size used throughout the tests.
pub const TILE_SIZE: u32 = 256;

/// Source tile width. Chosen so no source level ties a display resolution.
pub const SOURCE_TILE_WIDTH: u32 = 200;

/// Meters per degree on the web Mercator sphere.
pub const METERS_PER_DEGREE: f64 = 2.0 * std::f64::consts::PI * 6_378_137.0 / 360.0;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// =============================================================================
// Capabilities
// =============================================================================

/// One level of a plate carrée grid anchored at (-180, 90).
///
/// `span` is the tile side in degrees.
pub fn geographic_matrix(identifier: &str, span: f64) -> TileMatrix {
    let resolution = span * METERS_PER_DEGREE / f64::from(SOURCE_TILE_WIDTH);
    TileMatrix {
        identifier: identifier.to_string(),
        scale_denominator: resolution / STANDARDIZED_PIXEL_SIZE,
        top_left_corner: [-180.0, 90.0],
        tile_width: SOURCE_TILE_WIDTH,
        matrix_width: (360.0 / span).round() as u32,
        matrix_height: (180.0 / span).round() as u32,
    }
}

/// A two-level geographic layer: matrix "0" with 180 degree tiles and
/// matrix "1" with 90 degree tiles.
///
/// With 256 px display tiles, display zoom 0 resolves to "0" and every
/// deeper zoom to "1".
pub fn geographic_capabilities() -> Capabilities {
    Capabilities {
        layer: LayerInfo {
            identifier: "plate-carree".to_string(),
            title: Some("Synthetic plate carrée layer".to_string()),
            wgs84_bounding_box: Rectangle::new(-180.0, -90.0, 180.0, 90.0).unwrap(),
            valid_data_bounds: None,
            tile_url_template: "/{TileMatrix}/{TileRow}/{TileCol}.png".to_string(),
            tile_matrix_set: Some("EPSG:4326".to_string()),
        },
        tile_matrix_sets: vec![TileMatrixSetInfo {
            identifier: "EPSG:4326".to_string(),
            supported_crs: Some("urn:ogc:def:crs:EPSG::4326".to_string()),
            pixel_scale: PixelScale {
                standardized_pixel_size: STANDARDIZED_PIXEL_SIZE,
                meters_per_unit: METERS_PER_DEGREE,
            },
            tile_matrices: vec![
                geographic_matrix("0", 180.0),
                geographic_matrix("1", 90.0),
            ],
        }],
    }
}

/// Capabilities whose layer stops at the given longitude/latitude box.
pub fn geographic_capabilities_within(bounds: Rectangle) -> Capabilities {
    let mut capabilities = geographic_capabilities();
    capabilities.layer.wgs84_bounding_box = bounds;
    capabilities
}

/// Capabilities with imagery only inside `valid` (degrees).
pub fn geographic_capabilities_with_valid_data(valid: Rectangle) -> Capabilities {
    let mut capabilities = geographic_capabilities();
    capabilities.layer.valid_data_bounds = Some(valid);
    capabilities
}

/// Provider that fails a fixed number of times before succeeding.
pub struct FlakyCapabilities {
    capabilities: Capabilities,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyCapabilities {
    pub fn new(capabilities: Capabilities, failures: usize) -> Self {
        Self {
            capabilities,
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilitiesProvider for FlakyCapabilities {
    async fn load(&self) -> Result<Capabilities, CapabilitiesError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CapabilitiesError::Io {
                path: "capabilities.json".to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.capabilities.clone())
    }
}

// =============================================================================
// Mock Imagery
// =============================================================================

/// Colors each source tile by column: even columns red, odd columns blue.
///
/// Counts fetches and remembers the requested URLs.
#[derive(Default)]
pub struct ColumnImagery {
    fetches: AtomicUsize,
    urls: std::sync::Mutex<Vec<String>>,
}

impl ColumnImagery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

pub fn column_color(col: u32) -> Rgba<u8> {
    if col % 2 == 0 {
        RED
    } else {
        BLUE
    }
}

#[async_trait]
impl ImagerySource for ColumnImagery {
    async fn fetch(&self, tile: &SourceTileRef, url: &str) -> Result<RgbaImage, ImageryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        Ok(RgbaImage::from_pixel(
            tile.tile_width,
            tile.tile_width,
            column_color(tile.col),
        ))
    }
}

/// Every fetch fails.
pub struct FailingImagery;

#[async_trait]
impl ImagerySource for FailingImagery {
    async fn fetch(&self, _: &SourceTileRef, url: &str) -> Result<RgbaImage, ImageryError> {
        Err(ImageryError::NotFound(url.to_string()))
    }
}

/// Fails even columns and serves odd columns blue.
#[derive(Default)]
pub struct EvenColumnFailingImagery {
    fetches: AtomicUsize,
}

impl EvenColumnFailingImagery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImagerySource for EvenColumnFailingImagery {
    async fn fetch(&self, tile: &SourceTileRef, url: &str) -> Result<RgbaImage, ImageryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if tile.col % 2 == 0 {
            return Err(ImageryError::NotFound(url.to_string()));
        }
        Ok(RgbaImage::from_pixel(tile.tile_width, tile.tile_width, BLUE))
    }
}

/// Holds every fetch until released.
///
/// `started` is notified when the first fetch begins.
pub struct GatedImagery {
    gate: Semaphore,
    pub started: Notify,
}

impl GatedImagery {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: Notify::new(),
        }
    }

    /// Let all pending and future fetches complete.
    pub fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl ImagerySource for GatedImagery {
    async fn fetch(&self, tile: &SourceTileRef, _: &str) -> Result<RgbaImage, ImageryError> {
        self.started.notify_one();
        let _permit = self.gate.acquire().await;
        Ok(RgbaImage::from_pixel(
            tile.tile_width,
            tile.tile_width,
            GREEN,
        ))
    }
}

// =============================================================================
// Sources and Routers
// =============================================================================

pub fn test_options() -> SourceOptions {
    SourceOptions {
        division: 4,
        max_zoom: 6,
        ..SourceOptions::default()
    }
}

/// A geographic source displayed on a 256 px web Mercator grid.
pub fn geographic_source(
    provider: Arc<dyn CapabilitiesProvider>,
    imagery: Arc<dyn ImagerySource>,
) -> TileSource {
    geographic_source_with_options(provider, imagery, test_options())
}

pub fn geographic_source_with_options(
    provider: Arc<dyn CapabilitiesProvider>,
    imagery: Arc<dyn ImagerySource>,
    options: SourceOptions,
) -> TileSource {
    TileSource::new(
        provider,
        imagery,
        Projector::identity(),
        Arc::new(WebMercatorGrid::new(TILE_SIZE)),
        options,
    )
}

/// The default geographic layer served with column-colored imagery.
pub fn default_source() -> (Arc<TileSource>, Arc<ColumnImagery>) {
    let imagery = Arc::new(ColumnImagery::new());
    let source = Arc::new(geographic_source(
        Arc::new(StaticCapabilities::new(geographic_capabilities())),
        imagery.clone(),
    ));
    (source, imagery)
}

/// Router without request tracing.
pub fn test_router(source: Arc<TileSource>) -> Router {
    create_router(source, RouterConfig::new().with_tracing(false))
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Check if data starts with the PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

pub fn decode_png(data: &[u8]) -> RgbaImage {
    image::load_from_memory(data).unwrap().to_rgba8()
}

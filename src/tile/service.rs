//! Tile source orchestrating display tile generation.
//!
//! The TileSource is the host-facing entry point. For one display tile it:
//! - Validates the tile address
//! - Loads capabilities on first use
//! - Plans the tile (search + meshes), using the plan cache
//! - Fetches source imagery concurrently
//! - Draws the meshes into a pooled surface and encodes it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          TileSource                             │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                      load_tile()                          │  │
//! │  │  1. Clip to layer       4. Search source tiles            │  │
//! │  │  2. Reproject bounds    5. Build meshes, cache plan       │  │
//! │  │  3. Resolve level       6. Fetch, draw, encode            │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │        │              │               │              │          │
//! │        ▼              ▼               ▼              ▼          │
//! │  ┌───────────┐ ┌──────────────┐ ┌────────────┐ ┌─────────────┐  │
//! │  │ TileCache │ │ Capabilities │ │  Imagery   │ │ SurfacePool │  │
//! │  └───────────┘ └──────────────┘ └────────────┘ └─────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Cancellation
//!
//! [`TileSource::unload_tile`] bumps the generation of a tile's running
//! loads. A load that started under an older generation still finishes its
//! work, but its plan is not cached and it reports [`TileOutcome::Stale`]
//! instead of an image. Generations are only kept while a load of the tile
//! is running, so unloading idle or unknown tiles costs no memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::capabilities::{CapabilitiesProvider, SourceLayer};
use crate::error::{CapabilitiesError, SourceError};
use crate::geometry::{reproject_bounds, Rectangle};
use crate::imagery::ImagerySource;
use crate::mesh::{build_mesh, DisplayFrame, MeshOptions, DEFAULT_DIVISION, MAX_DIVISION};
use crate::projection::Projector;
use crate::pyramid::{find_intersecting_tiles, IntersectionTest, ZoomTable};
use crate::render::{draw_textured_mesh, SurfacePool, DEFAULT_POOL_SIZE};

use super::cache::{TileCache, DEFAULT_TILE_CACHE_CAPACITY};
use super::display::{DisplayGrid, ViewportTileKey};
use super::encoder::PngTileEncoder;
use super::inflight::{InFlightLoads, LoadTicket};
use super::plan::{footprint_polygon, PlannedTile, TileMeshResult};

/// Default deepest display zoom with a precomputed source level.
pub const DEFAULT_MAX_ZOOM: u8 = 22;

// =============================================================================
// Options
// =============================================================================

/// Tuning for a [`TileSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOptions {
    /// Tile matrix set to serve, the layer's linked set if `None`
    pub matrix_set: Option<String>,

    /// Mesh cells per source tile side, clamped to `1..=MAX_DIVISION`
    pub division: u32,

    /// Boundary samples per edge when reprojecting display bounds, clamped
    /// like `division`
    pub bounds_division: u32,

    /// Shrink UVs by one texel to hide tile seams
    pub inset_border: bool,

    pub intersection_test: IntersectionTest,

    /// Number of drawing surfaces
    pub pool_size: usize,

    /// Maximum number of cached plans
    pub cache_capacity: usize,

    /// Deepest display zoom in the precomputed zoom table
    pub max_zoom: u8,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            matrix_set: None,
            division: DEFAULT_DIVISION,
            bounds_division: DEFAULT_DIVISION,
            inset_border: true,
            intersection_test: IntersectionTest::default(),
            pool_size: DEFAULT_POOL_SIZE,
            cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// A rendered display tile.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub key: ViewportTileKey,

    /// PNG-encoded image, transparent where no imagery landed
    pub data: Bytes,

    /// Number of source tiles drawn or attempted
    pub source_tiles: usize,

    /// Whether the plan came from the cache
    pub cache_hit: bool,
}

/// Result of [`TileSource::load_tile`].
#[derive(Debug, Clone)]
pub enum TileOutcome {
    Rendered(RenderedTile),

    /// The tile was unloaded while it was being built
    Stale,
}

impl TileOutcome {
    pub fn is_stale(&self) -> bool {
        matches!(self, TileOutcome::Stale)
    }

    pub fn into_rendered(self) -> Option<RenderedTile> {
        match self {
            TileOutcome::Rendered(tile) => Some(tile),
            TileOutcome::Stale => None,
        }
    }
}

/// Counters describing the work a source has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Tile intersection searches run
    pub searches: u64,

    /// Display tiles rendered
    pub renders: u64,

    /// Loads that ended stale
    pub stale_loads: u64,

    pub cache_entries: usize,

    /// Tiles with a load in progress
    pub loads_in_flight: usize,

    pub surfaces_created: usize,
    pub surfaces_available: usize,
}

#[derive(Default)]
struct Counters {
    searches: AtomicU64,
    renders: AtomicU64,
    stale_loads: AtomicU64,
}

// =============================================================================
// Summary
// =============================================================================

/// Description of the served layer and pyramid.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub layer: String,
    pub projection: String,
    pub matrix_set: String,
    pub tile_url_template: String,
    pub wgs84_bounds: Rectangle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_data: Option<Rectangle>,
    /// Levels coarse to fine
    pub levels: Vec<LevelSummary>,
}

/// One pyramid level as seen by the search.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub identifier: String,
    pub scale_denominator: f64,
    /// Meters per pixel
    pub resolution: f64,
    /// Tile side in source CRS units
    pub tile_length: f64,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

// =============================================================================
// Tile Source
// =============================================================================

struct SourceState {
    layer: SourceLayer,
    zoom: ZoomTable,
}

/// Serves display tiles of one source layer.
///
/// All per-source state (plan cache, surface pool, zoom table, in-flight
/// loads and counters) lives here and is dropped with the source.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wmts_overlay::capabilities::JsonFileCapabilities;
/// use wmts_overlay::imagery::DirectoryImagery;
/// use wmts_overlay::projection::Projector;
/// use wmts_overlay::tile::{SourceOptions, TileSource, ViewportTileKey, WebMercatorGrid};
///
/// # async fn run() -> Result<(), wmts_overlay::error::SourceError> {
/// let source = TileSource::new(
///     Arc::new(JsonFileCapabilities::new("capabilities.json")),
///     Arc::new(DirectoryImagery::new("tiles")),
///     Projector::web_mercator(),
///     Arc::new(WebMercatorGrid::default()),
///     SourceOptions::default(),
/// );
///
/// let outcome = source.load_tile(ViewportTileKey::new(16, 10, 5)).await?;
/// if let Some(tile) = outcome.into_rendered() {
///     println!("{} bytes from {} source tiles", tile.data.len(), tile.source_tiles);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TileSource {
    provider: Arc<dyn CapabilitiesProvider>,
    imagery: Arc<dyn ImagerySource>,
    projector: Projector,
    grid: Arc<dyn DisplayGrid>,
    options: SourceOptions,

    state: OnceCell<SourceState>,
    cache: TileCache,
    pool: SurfacePool,
    encoder: PngTileEncoder,
    in_flight: InFlightLoads,
    counters: Counters,
}

impl TileSource {
    /// Create a source. Capabilities are loaded lazily on the first request.
    pub fn new(
        provider: Arc<dyn CapabilitiesProvider>,
        imagery: Arc<dyn ImagerySource>,
        projector: Projector,
        grid: Arc<dyn DisplayGrid>,
        options: SourceOptions,
    ) -> Self {
        let options = SourceOptions {
            division: options.division.clamp(1, MAX_DIVISION),
            bounds_division: options.bounds_division.clamp(1, MAX_DIVISION),
            ..options
        };
        let size = grid.tile_size();
        Self {
            cache: TileCache::with_capacity(options.cache_capacity),
            pool: SurfacePool::new(options.pool_size, size, size),
            encoder: PngTileEncoder::new(),
            provider,
            imagery,
            projector,
            grid,
            options,
            state: OnceCell::new(),
            in_flight: InFlightLoads::new(),
            counters: Counters::default(),
        }
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Load capabilities now instead of on the first request.
    pub async fn ready(&self) -> Result<(), SourceError> {
        self.state().await.map(|_| ())
    }

    /// Render a display tile.
    ///
    /// A tile outside the layer, or whose source tiles all fail to fetch, is
    /// rendered fully transparent.
    ///
    /// # Errors
    ///
    /// Fails on an invalid address, a failed initialization, a failed bounds
    /// reprojection, an encoder failure, or a closed source.
    pub async fn load_tile(&self, key: ViewportTileKey) -> Result<TileOutcome, SourceError> {
        let ticket = self.in_flight.begin(key);
        let (plan, cache_hit) = self.resolve_plan(key, &ticket).await?;

        let textures = self.fetch_textures(&plan).await;

        if ticket.is_stale() {
            return Ok(self.stale(key));
        }

        let mut surface = self.pool.acquire().await.ok_or(SourceError::Closed)?;

        if ticket.is_stale() {
            return Ok(self.stale(key));
        }

        for (tile, texture) in plan.tiles.iter().zip(&textures) {
            if let Some(texture) = texture {
                draw_textured_mesh(surface.image_mut(), &tile.mesh, texture);
            }
        }

        let data = self.encoder.encode(surface.image())?;
        drop(surface);

        self.counters.renders.fetch_add(1, Ordering::Relaxed);
        debug!(
            tile = %key,
            source_tiles = plan.tiles.len(),
            cache_hit,
            bytes = data.len(),
            "Rendered tile"
        );

        Ok(TileOutcome::Rendered(RenderedTile {
            key,
            data,
            source_tiles: plan.tiles.len(),
            cache_hit,
        }))
    }

    /// Forget a display tile.
    ///
    /// Drops its cached plan and marks any in-flight load of it stale.
    ///
    /// # Errors
    ///
    /// Fails on an invalid address, without touching any state.
    pub async fn unload_tile(&self, key: ViewportTileKey) -> Result<(), SourceError> {
        if !key.is_valid() {
            return Err(invalid_tile(key));
        }
        let interrupted = self.in_flight.unload(&key);
        self.cache.invalidate(&key).await;
        trace!(tile = %key, interrupted, "Unloaded tile");
        Ok(())
    }

    /// Search and mesh a display tile without rendering it.
    ///
    /// Uses and fills the same cache as [`Self::load_tile`].
    pub async fn plan(&self, key: ViewportTileKey) -> Result<Arc<TileMeshResult>, SourceError> {
        let ticket = self.in_flight.begin(key);
        let (plan, _) = self.resolve_plan(key, &ticket).await?;
        Ok(plan)
    }

    /// Describe the served layer, loading capabilities if needed.
    pub async fn summary(&self) -> Result<SourceSummary, SourceError> {
        let state = self.state().await?;
        let layer = &state.layer;
        let scale = layer.pyramid.scale();

        Ok(SourceSummary {
            layer: layer.identifier.clone(),
            projection: self.projector.name().to_string(),
            matrix_set: layer.pyramid.identifier().to_string(),
            tile_url_template: layer.template.to_string(),
            wgs84_bounds: layer.wgs84_bounds,
            valid_data: layer.valid_data,
            levels: layer
                .pyramid
                .matrices()
                .iter()
                .map(|m| LevelSummary {
                    identifier: m.identifier.clone(),
                    scale_denominator: m.scale_denominator,
                    resolution: scale.resolution(m),
                    tile_length: scale.tile_length(m),
                    matrix_width: m.matrix_width,
                    matrix_height: m.matrix_height,
                })
                .collect(),
        })
    }

    pub async fn stats(&self) -> SourceStats {
        SourceStats {
            searches: self.counters.searches.load(Ordering::Relaxed),
            renders: self.counters.renders.load(Ordering::Relaxed),
            stale_loads: self.counters.stale_loads.load(Ordering::Relaxed),
            cache_entries: self.cache.len().await,
            loads_in_flight: self.in_flight.len(),
            surfaces_created: self.pool.created(),
            surfaces_available: self.pool.available(),
        }
    }

    /// Stop handing out surfaces; pending and future loads fail with
    /// [`SourceError::Closed`].
    pub fn close(&self) {
        self.pool.close();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn state(&self) -> Result<&SourceState, SourceError> {
        let state = self
            .state
            .get_or_try_init(|| async {
                let capabilities = self.provider.load().await?;
                let layer = capabilities.resolve(self.options.matrix_set.as_deref())?;
                let zoom = ZoomTable::build(&layer.pyramid, self.options.max_zoom, |z| {
                    self.grid.meters_per_pixel(z)
                });

                info!(
                    layer = %layer.identifier,
                    matrix_set = %layer.pyramid.identifier(),
                    levels = layer.pyramid.len(),
                    projection = %self.projector.name(),
                    "Tile source initialized"
                );
                Ok::<_, CapabilitiesError>(SourceState { layer, zoom })
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Tile source initialization failed");
                SourceError::Initialization(e)
            })?;
        Ok(state)
    }

    fn stale(&self, key: ViewportTileKey) -> TileOutcome {
        self.counters.stale_loads.fetch_add(1, Ordering::Relaxed);
        warn!(tile = %key, "Tile unloaded during load, discarding result");
        TileOutcome::Stale
    }

    async fn resolve_plan(
        &self,
        key: ViewportTileKey,
        ticket: &LoadTicket<'_>,
    ) -> Result<(Arc<TileMeshResult>, bool), SourceError> {
        if !key.is_valid() {
            return Err(invalid_tile(key));
        }

        if let Some(plan) = self.cache.get(&key).await {
            return Ok((plan, true));
        }

        let plan = Arc::new(self.build_plan(key).await?);

        if !ticket.is_stale() {
            self.cache.put(key, Arc::clone(&plan)).await;
        }
        Ok((plan, false))
    }

    async fn build_plan(&self, key: ViewportTileKey) -> Result<TileMeshResult, SourceError> {
        let lnglat = self.grid.tile_bounds(key).ok_or_else(|| invalid_tile(key))?;
        let projected = self
            .grid
            .projected_bounds(key)
            .ok_or_else(|| invalid_tile(key))?;

        let state = self.state().await?;
        let layer = &state.layer;
        let pyramid = &layer.pyramid;

        let Some(clipped) = lnglat.intersection(&layer.wgs84_bounds) else {
            trace!(tile = %key, "Tile outside layer bounds");
            return Ok(TileMeshResult::empty(key));
        };

        let source_clip = reproject_bounds(&clipped, self.options.bounds_division, |p| {
            self.projector.forward(p)
        })?;

        let level = state
            .zoom
            .get(key.z)
            .unwrap_or_else(|| pyramid.resolve_zoom_index(self.grid.meters_per_pixel(key.z)));
        let matrix = pyramid.get(level).unwrap_or_else(|| pyramid.finest());
        let scale = pyramid.scale();

        // Pad by one tile so the search cannot miss tiles straddling the edge
        let padded = source_clip
            .pad(scale.tile_length(matrix))
            .unwrap_or(source_clip);

        self.counters.searches.fetch_add(1, Ordering::Relaxed);
        let found = find_intersecting_tiles(&padded, matrix, scale, self.options.intersection_test);

        let frame = DisplayFrame {
            bounds: projected,
            size: self.grid.tile_size(),
        };
        let mesh_options = MeshOptions {
            division: self.options.division,
            inset_border: self.options.inset_border,
            valid_data: layer.valid_data,
        };
        let to_display = |p| self.grid.forward(self.projector.inverse(p)?);

        let mut tiles = Vec::with_capacity(found.len());
        for source in found {
            let mesh = match build_mesh(&source, &mesh_options, &to_display, &frame) {
                Ok(Some(mesh)) => mesh,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        tile = %key,
                        col = source.col,
                        row = source.row,
                        error = %e,
                        "Skipping source tile that failed to project"
                    );
                    continue;
                }
            };
            let outline = match footprint_polygon(&source, self.options.division, |p| {
                self.projector.inverse(p)
            }) {
                Ok(outline) => outline,
                Err(e) => {
                    warn!(tile = %key, error = %e, "Source tile outline failed to project");
                    Vec::new()
                }
            };
            let url = layer.template.expand_tile(&source);
            tiles.push(PlannedTile {
                source,
                url,
                outline,
                mesh,
            });
        }

        debug!(
            tile = %key,
            matrix = %matrix.identifier,
            source_tiles = tiles.len(),
            "Planned tile"
        );

        Ok(TileMeshResult {
            key,
            matrix: Some(Arc::from(matrix.identifier.as_str())),
            tiles,
        })
    }

    /// Fetch imagery for every planned tile concurrently.
    ///
    /// Failures are logged and leave the matching slot empty.
    async fn fetch_textures(&self, plan: &TileMeshResult) -> Vec<Option<RgbaImage>> {
        let mut textures: Vec<Option<RgbaImage>> = vec![None; plan.tiles.len()];
        let mut fetches = JoinSet::new();

        for (index, tile) in plan.tiles.iter().enumerate() {
            let imagery = Arc::clone(&self.imagery);
            let source = tile.source.clone();
            let url = tile.url.clone();
            fetches.spawn(async move {
                let result = imagery.fetch(&source, &url).await;
                (index, url, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, _, Ok(texture))) => textures[index] = Some(texture),
                Ok((_, url, Err(e))) => {
                    warn!(url = %url, error = %e, "Failed to fetch source tile");
                }
                Err(e) => {
                    warn!(error = %e, "Source tile fetch task failed");
                }
            }
        }

        textures
    }
}

fn invalid_tile(key: ViewportTileKey) -> SourceError {
    SourceError::InvalidTile {
        x: key.x,
        y: key.y,
        z: key.z,
    }
}

// =============================================================================
// Tests
// =============================================================================

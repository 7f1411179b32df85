//! HTTP request handlers for the overlay tile API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.png` - Render a display tile
//! - `DELETE /tiles/{z}/{x}/{y}` - Unload a display tile
//! - `GET /debug/{z}/{x}/{y}[?centers=true]` - Source tile footprints as GeoJSON
//! - `GET /source` - Layer and pyramid summary
//! - `GET /stats` - Source counters
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::error::SourceError;
use crate::tile::{SourceStats, SourceSummary, TileOutcome, TileSource, ViewportTileKey};

/// Whether the tile plan was served from cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-tile-cache-hit");

/// Number of source tiles drawn into the display tile.
pub const SOURCE_TILES_HEADER: HeaderName = HeaderName::from_static("x-source-tiles");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile source.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<TileSource>,

    /// Cache-Control max-age in seconds for rendered tiles
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(source: Arc<TileSource>) -> Self {
        Self {
            source,
            cache_max_age: 3600,
        }
    }

    pub fn with_cache_max_age(source: Arc<TileSource>, cache_max_age: u32) -> Self {
        Self {
            source,
            cache_max_age,
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from `/tiles/{z}/{x}/{filename}` where filename is `{y}` or
/// `{y}.png`.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub z: u8,
    pub x: u32,
    pub filename: String,
}

impl TilePathParams {
    /// Parse the row from the filename, stripping any `.png` extension.
    pub fn y(&self) -> Result<u32, std::num::ParseIntError> {
        let y = self.filename.strip_suffix(".png").unwrap_or(&self.filename);
        y.parse()
    }

    pub fn key(&self) -> Result<ViewportTileKey, ApiError> {
        let y = self
            .y()
            .map_err(|_| ApiError::BadPath(format!("Invalid tile row: {}", self.filename)))?;
        Ok(ViewportTileKey::new(self.x, y, self.z))
    }
}

/// Path parameters for debug requests.
#[derive(Debug, Deserialize)]
pub struct DebugPathParams {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Query parameters for debug requests.
#[derive(Debug, Default, Deserialize)]
pub struct DebugQuery {
    /// Add a labelled point at the center of every source tile
    #[serde(default)]
    pub centers: bool,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_tile", "unavailable")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    // Log errors based on severity
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

/// Convert SourceError to HTTP response.
///
/// - Initialization and closed source map to 503 Service Unavailable
/// - Invalid tile addresses map to 400 Bad Request
/// - Everything else maps to 500 Internal Server Error
impl IntoResponse for SourceError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            SourceError::Initialization(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            SourceError::Closed => (StatusCode::SERVICE_UNAVAILABLE, "closed"),
            SourceError::InvalidTile { .. } => (StatusCode::BAD_REQUEST, "invalid_tile"),
            SourceError::Projection(_) => (StatusCode::INTERNAL_SERVER_ERROR, "projection_error"),
            SourceError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
        };
        error_response(status, error_type, self.to_string())
    }
}

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Path parameters that parse but do not form a tile address
    #[error("{0}")]
    BadPath(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Source(e) => e.into_response(),
            ApiError::BadPath(message) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_path", message)
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Render a display tile.
///
/// # Endpoint
///
/// `GET /tiles/{z}/{x}/{y}.png`
///
/// # Response
///
/// - `200 OK`: PNG image, transparent where the layer has no imagery
/// - `204 No Content`: the tile was unloaded while it was being rendered
/// - `400 Bad Request`: address outside the display grid
/// - `503 Service Unavailable`: capabilities could not be loaded
///
/// # Headers
///
/// - `Content-Type: image/png`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
/// - `X-Source-Tiles: {count}`
pub async fn tile_handler(
    State(state): State<AppState>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, ApiError> {
    let key = params.key()?;

    let tile = match state.source.load_tile(key).await? {
        TileOutcome::Rendered(tile) => tile,
        TileOutcome::Stale => return Ok(StatusCode::NO_CONTENT.into_response()),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Ok(value) = HeaderValue::try_from(format!("public, max-age={}", state.cache_max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(
        CACHE_HIT_HEADER,
        HeaderValue::from_static(if tile.cache_hit { "true" } else { "false" }),
    );
    headers.insert(SOURCE_TILES_HEADER, HeaderValue::from(tile.source_tiles));

    Ok((StatusCode::OK, headers, tile.data).into_response())
}

/// Unload a display tile.
///
/// # Endpoint
///
/// `DELETE /tiles/{z}/{x}/{y}`
///
/// `204 No Content` for a valid address, `400 Bad Request` otherwise.
pub async fn unload_handler(
    State(state): State<AppState>,
    Path(params): Path<TilePathParams>,
) -> Result<StatusCode, ApiError> {
    let key = params.key()?;
    state.source.unload_tile(key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Source tile footprints for a display tile.
///
/// # Endpoint
///
/// `GET /debug/{z}/{x}/{y}`
///
/// # Response
///
/// `200 OK` with a GeoJSON `FeatureCollection` of longitude/latitude
/// polygons, each labelled with the source column `x`, row `y` and matrix
/// `z`. With `?centers=true` a point per source tile follows the polygons.
pub async fn debug_handler(
    State(state): State<AppState>,
    Path(params): Path<DebugPathParams>,
    Query(query): Query<DebugQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = ViewportTileKey::new(params.x, params.y, params.z);
    let plan = state.source.plan(key).await?;
    Ok(Json(plan.debug_geojson(query.centers)))
}

/// Layer and pyramid summary.
///
/// # Endpoint
///
/// `GET /source`
pub async fn source_handler(
    State(state): State<AppState>,
) -> Result<Json<SourceSummary>, ApiError> {
    Ok(Json(state.source.summary().await?))
}

/// Source counters.
///
/// # Endpoint
///
/// `GET /stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<SourceStats> {
    Json(state.source.stats().await)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================

use thiserror::Error;

/// Errors raised while projecting coordinates between reference systems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// Point lies outside the domain of the projection (e.g. beyond the
    /// Mercator latitude limit)
    #[error("Point ({x}, {y}) is outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },

    /// Projection produced NaN or infinity
    #[error("Projection of ({x}, {y}) produced a non-finite coordinate")]
    NonFinite { x: f64, y: f64 },

    /// Reprojected samples collapsed to a zero-area extent
    #[error("Reprojected extent has no area")]
    Degenerate,

    /// Error reported by an external projection backend
    #[error("Projection backend error: {0}")]
    Backend(String),
}

/// Errors raised while loading or validating capabilities
///
/// Any of these aborts source initialization; no tile is served from a
/// partially described pyramid.
#[derive(Debug, Clone, Error)]
pub enum CapabilitiesError {
    /// Capabilities document could not be read
    #[error("Failed to read capabilities from {path}: {message}")]
    Io { path: String, message: String },

    /// Capabilities document is not valid JSON for the expected schema
    #[error("Failed to parse capabilities: {0}")]
    Parse(String),

    /// Document declares no tile matrix set
    #[error("Capabilities declare no tile matrix set")]
    NoTileMatrixSet,

    /// Requested tile matrix set is not declared
    #[error("Tile matrix set not found: {0}")]
    UnknownTileMatrixSet(String),

    /// Tile matrix set has no levels
    #[error("Tile matrix set {0} has no tile matrices")]
    EmptyPyramid(String),

    /// Scale denominators are not strictly increasing or decreasing
    #[error("Tile matrix set {set} is not ordered by scale at matrix {matrix}")]
    NonMonotonicScales { set: String, matrix: String },

    /// A numeric field is zero, negative or not finite
    #[error("Invalid value for {field} in tile matrix {matrix}: {value}")]
    InvalidValue {
        matrix: String,
        field: &'static str,
        value: f64,
    },

    /// Tile URL template lacks a required placeholder
    #[error("Tile URL template is missing the {0} placeholder")]
    InvalidTemplate(&'static str),
}

/// Errors raised while acquiring imagery for a single source tile
///
/// These never abort a display tile; the affected source tile is left
/// transparent.
#[derive(Debug, Clone, Error)]
pub enum ImageryError {
    /// No image exists for the tile
    #[error("Tile image not found: {0}")]
    NotFound(String),

    /// Image exists but could not be read
    #[error("I/O error reading {location}: {message}")]
    Io { location: String, message: String },

    /// Image bytes could not be decoded
    #[error("Failed to decode {location}: {message}")]
    Decode { location: String, message: String },
}

/// Errors surfaced to the host for a display tile request
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source could not be initialized from its capabilities
    #[error("Source initialization failed: {0}")]
    Initialization(#[from] CapabilitiesError),

    /// Display tile address is outside the display grid
    #[error("Invalid display tile {z}/{x}/{y}")]
    InvalidTile { x: u32, y: u32, z: u8 },

    /// Geometry for the request could not be projected
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Rendered surface could not be encoded
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// Source was closed while the request waited for a surface
    #[error("Tile source is closed")]
    Closed,
}

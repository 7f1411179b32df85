//! Source tile imagery.
//!
//! Fetching is a collaborator concern: the engine only needs a decoded RGBA
//! image per source tile. [`ImagerySource`] is the seam; the built-in
//! [`DirectoryImagery`] serves tiles laid out on disk by the expanded URL
//! template, and [`CheckerboardImagery`] paints synthetic tiles for
//! inspecting placement without any imagery.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use crate::error::ImageryError;
use crate::pyramid::SourceTileRef;

/// Supplies decoded imagery for source tiles.
#[async_trait]
pub trait ImagerySource: Send + Sync {
    /// Fetch and decode one tile.
    ///
    /// `url` is the layer template expanded for `tile`.
    async fn fetch(&self, tile: &SourceTileRef, url: &str) -> Result<RgbaImage, ImageryError>;
}

// =============================================================================
// DirectoryImagery
// =============================================================================

/// Reads tiles from a directory tree.
///
/// The expanded URL is taken as a path relative to the root. Leading
/// slashes are ignored and any `..` component is refused.
#[derive(Debug, Clone)]
pub struct DirectoryImagery {
    root: PathBuf,
}

impl DirectoryImagery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an expanded URL to a file under the root.
    fn resolve(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url.trim_start_matches('/'));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }
}

#[async_trait]
impl ImagerySource for DirectoryImagery {
    async fn fetch(&self, _tile: &SourceTileRef, url: &str) -> Result<RgbaImage, ImageryError> {
        let path = self
            .resolve(url)
            .ok_or_else(|| ImageryError::NotFound(url.to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ImageryError::NotFound(url.to_string())
            } else {
                ImageryError::Io {
                    location: path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let image = image::load_from_memory(&bytes).map_err(|e| ImageryError::Decode {
            location: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(image.to_rgba8())
    }
}

// =============================================================================
// CheckerboardImagery
// =============================================================================

/// Tile color where `col + row` is even.
pub const CHECKER_EVEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

/// Tile color where `col + row` is odd.
pub const CHECKER_ODD: Rgba<u8> = Rgba([240, 220, 0, 255]);

/// Paints every source tile a solid color alternating by column and row,
/// so neighbouring tiles and their seams are easy to tell apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckerboardImagery;

impl CheckerboardImagery {
    pub fn color(tile: &SourceTileRef) -> Rgba<u8> {
        if (u64::from(tile.col) + u64::from(tile.row)) % 2 == 0 {
            CHECKER_EVEN
        } else {
            CHECKER_ODD
        }
    }
}

#[async_trait]
impl ImagerySource for CheckerboardImagery {
    async fn fetch(&self, tile: &SourceTileRef, _url: &str) -> Result<RgbaImage, ImageryError> {
        let size = tile.tile_width.max(1);
        Ok(RgbaImage::from_pixel(size, size, Self::color(tile)))
    }
}

// =============================================================================
// Tests
// =============================================================================

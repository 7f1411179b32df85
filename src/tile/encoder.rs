//! PNG tile encoder.
//!
//! Rendered display tiles carry transparency wherever no source imagery
//! landed, so they are always encoded as PNG.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, RgbaImage};

use crate::error::SourceError;

// =============================================================================
// PNG Encoder
// =============================================================================

/// Encodes rendered RGBA surfaces to PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTileEncoder {
    fast: bool,
}

impl PngTileEncoder {
    /// Create an encoder with default compression.
    pub fn new() -> Self {
        Self { fast: false }
    }

    /// Create an encoder that trades size for speed.
    pub fn fast() -> Self {
        Self { fast: true }
    }

    /// Encode an RGBA image.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Encode`] if the PNG writer fails.
    pub fn encode(&self, image: &RgbaImage) -> Result<Bytes, SourceError> {
        let mut output = Cursor::new(Vec::new());
        let (compression, filter) = if self.fast {
            (CompressionType::Fast, FilterType::NoFilter)
        } else {
            (CompressionType::Default, FilterType::Adaptive)
        };

        PngEncoder::new_with_quality(&mut output, compression, filter)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| SourceError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output.into_inner()))
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Tile URL templates.
//!
//! WMTS RESTful templates name the tile address with `{TileMatrix}`,
//! `{TileRow}` and `{TileCol}`. Every occurrence is substituted; any other
//! text, including unknown placeholders, passes through untouched.

use std::fmt;

use serde::Serialize;

use crate::error::CapabilitiesError;
use crate::pyramid::SourceTileRef;

const TILE_MATRIX: &str = "{TileMatrix}";
const TILE_ROW: &str = "{TileRow}";
const TILE_COL: &str = "{TileCol}";

/// A validated tile URL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    /// Validate a template.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::InvalidTemplate`] naming the first
    /// missing placeholder.
    pub fn parse(template: impl Into<String>) -> Result<Self, CapabilitiesError> {
        let template = template.into();
        for placeholder in [TILE_MATRIX, TILE_ROW, TILE_COL] {
            if !template.contains(placeholder) {
                return Err(CapabilitiesError::InvalidTemplate(placeholder));
            }
        }
        Ok(Self(template))
    }

    /// Substitute a tile address.
    pub fn expand(&self, matrix: &str, row: u32, col: u32) -> String {
        self.0
            .replace(TILE_MATRIX, matrix)
            .replace(TILE_ROW, &row.to_string())
            .replace(TILE_COL, &col.to_string())
    }

    /// Substitute the address of a selected source tile.
    pub fn expand_tile(&self, tile: &SourceTileRef) -> String {
        self.expand(&tile.matrix, tile.row, tile.col)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

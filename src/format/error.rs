//! Error types for tile containers and page layout documents.

use thiserror::Error;

/// Malformed tile container or tile payload.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Blob does not start with a known magic
    #[error("Unknown magic {magic:?} at offset {offset}")]
    BadMagic {
        /// Offset of the blob inside the outermost buffer
        offset: usize,
        /// The four bytes found
        magic: [u8; 4],
    },

    /// Buffer ends before a header or payload does
    #[error("Truncated container at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Container holds a different number of tiles than the file covers
    #[error("Expected {expected} tiles, found {found}")]
    TileCount { expected: usize, found: usize },

    /// Multi containers nested deeper than the parser allows
    #[error("Container nesting exceeds {0} levels")]
    TooDeep(usize),

    /// Unknown pixel format id
    #[error("Unsupported pixel format id {0}")]
    UnsupportedFormat(u32),

    /// Payload size disagrees with the declared dimensions
    #[error("Tile {width}x{height} has {actual} payload bytes, expected {expected}")]
    PayloadSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Encoded payload could not be decoded
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoded image size disagrees with the header
    #[error("Decoded image is {found_width}x{found_height}, header says {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
}

/// Invalid page layout document.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A hint, cluster or range refers outside its owner
    #[error("Invalid layout: {message}")]
    InvalidIndex { message: String },
}

impl LayoutError {
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            message: message.into(),
        }
    }
}

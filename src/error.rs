//! Error types for tile loading and the viewer as a whole.

use thiserror::Error;

use crate::cache::ManifestError;
use crate::format::{ContainerError, LayoutError};

/// Failure to load one tile file. Reported per file, never retried.
#[derive(Error, Debug)]
pub enum TileError {
    /// The content source could not deliver the file
    #[error("Failed to fetch {path}: {message}")]
    Transport { path: String, message: String },

    /// The file arrived but is not a valid container for its pages
    #[error("Malformed tile file {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: ContainerError,
    },
}

impl TileError {
    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn format(path: impl Into<String>, source: ContainerError) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }

    /// Path of the file that failed.
    pub fn path(&self) -> &str {
        match self {
            TileError::Transport { path, .. } | TileError::Format { path, .. } => path,
        }
    }
}

/// Top-level errors surfaced by the viewer binary and setup code.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error("GPU error: {0}")]
    Gpu(#[from] mipview_gpu::GpuError),

    #[error("Window error: {0}")]
    Window(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;

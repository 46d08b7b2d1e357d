//! mipview - progressively loaded page viewer
//!
//! Pages are served as pyramids of tiles at several resolutions. The viewer
//! shows whatever resolution is resident, fetches finer levels in the
//! background, and lets the reader pan, pinch and flick between pages while
//! selecting text on an OCR overlay.

pub mod cache;
pub mod compose;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod geometry;
pub mod gesture;
pub mod overlay;
pub mod render;
pub mod viewer;

pub use cache::{ContentSource, HttpSource, MemorySource, MipCache};
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use gesture::{GestureEngine, Viewport};
pub use overlay::OverlayEngine;
pub use render::TiledRenderer;
pub use viewer::Viewer;

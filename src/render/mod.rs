//! Scene rendering: per-page mip selection, GPU texture pool and backends.

pub mod backend;
pub mod renderer;
pub mod scene;
pub mod wgpu_backend;

pub use backend::{DrawQuad, RecordedUpload, RecordingBackend, RenderBackend, TextureDesc, TextureId};
pub use renderer::{RenderError, RendererStats, TiledRenderer, mip_for_footprint, next_power_of_two};
pub use scene::{PlacedImage, Scene};
pub use wgpu_backend::WgpuBackend;

//! wgpu layer of the page viewer: context, mip-chain page textures and the
//! instanced page-quad pipeline.

pub mod bindings;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod texture;
pub mod uniform;

pub use config::{ClearColor, GpuConfig, TextureConfig};
pub use context::GpuContext;
pub use error::{GpuError, Result};
pub use pipeline::{PageDraw, PagePipeline};
pub use texture::MipTexture;
pub use uniform::{PageInstance, QuadVertex, ScreenUniform};

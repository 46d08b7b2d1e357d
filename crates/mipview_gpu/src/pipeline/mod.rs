//! Render pipelines.

pub mod builder;
pub mod page;

pub use builder::{BindGroupLayoutBuilder, PipelineBuilder};
pub use page::{PageDraw, PagePipeline};

//! Tile loading: manifest, content sources, fetch scheduling and the
//! bounded multi-resolution tile cache.

pub mod manifest;
pub mod mip_cache;
pub mod pool;
pub mod scheduler;
pub mod source;

pub use manifest::{LevelLayout, Manifest, ManifestError, MipFileInfo};
pub use mip_cache::{CacheEvent, CacheStats, FileState, MipCache, MipPageView};
pub use pool::BoundedPool;
pub use scheduler::{FetchOutcome, FetchRequest, FetchScheduler, InlineScheduler, ThreadScheduler};
pub use source::{ContentSource, DecodingSource, HttpSource, MemorySource};

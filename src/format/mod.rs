//! Wire formats consumed by the viewer: the binary tile container and the
//! page layout JSON document.

pub mod container;
pub mod error;
pub mod layout;

pub use container::{
    MULTI_MAGIC, PixelFormat, SINGLE_MAGIC, Tile, decode_container, encode_multi, encode_single,
    parse_container,
};
pub use error::{ContainerError, LayoutError};
pub use layout::{Cluster, HintRange, PageGeometry, PageLayout, Paragraph, Symbol};

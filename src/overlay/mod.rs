//! OCR overlay: hit testing, selection and annotation panel placement.

mod engine;
mod panel;

pub use engine::{OverlayEngine, PanelContent, PanelUpdate, Selection};
pub use hit_test::{SymbolRef, nearest_in_paragraph, nearest_symbol};
pub use panel::{PanelAnchor, PanelOrientation, PanelPlacer, PanelSide, PanelSink};

//! Page layout documents: OCR geometry for one page.
//!
//! ```json
//! {
//!   "resolution": { "width": 1200, "height": 1800 },
//!   "paragraphs": [{
//!     "bbox": { "x": 100, "y": 120, "width": 800, "height": 40 },
//!     "symbols": [{ "bbox": { ... }, "text": "猫" }],
//!     "hints": [{ "begin": 0, "end": 1, "results": ["cat"] }],
//!     "alt_hints": []
//!   }],
//!   "clusters": [{ "paragraphs": [0], "translation": "...", "bbox": { ... } }]
//! }
//! ```
//!
//! Symbol ranges (`begin`/`end`) are inclusive indices into the paragraph's
//! symbol list.

use serde::{Deserialize, Serialize};

use super::error::LayoutError;
use crate::geometry::{Rect, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub bbox: Rect,
    #[serde(default)]
    pub text: String,
}

/// A symbol span with lexical lookup results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintRange {
    pub begin: usize,
    pub end: usize,
    #[serde(default)]
    pub results: Vec<String>,
}

impl HintRange {
    pub fn contains(&self, symbol: usize) -> bool {
        self.begin <= symbol && symbol <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub bbox: Rect,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub hints: Vec<HintRange>,
    #[serde(default)]
    pub alt_hints: Vec<HintRange>,
}

impl Paragraph {
    /// Text of an inclusive symbol range.
    pub fn text(&self, begin: usize, end: usize) -> String {
        self.symbols[begin..=end]
            .iter()
            .map(|s| s.text.as_str())
            .collect()
    }
}

/// Paragraphs sharing one translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub paragraphs: Vec<usize>,
    #[serde(default)]
    pub translation: String,
    pub bbox: Rect,
}

/// Raw layout document as served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub resolution: Size,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

/// Validated, immutable geometry of one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageGeometry {
    pub resolution: Size,
    pub paragraphs: Vec<Paragraph>,
    pub clusters: Vec<Cluster>,
    cluster_of: Vec<Option<usize>>,
}

impl PageGeometry {
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let layout: PageLayout = serde_json::from_str(text)?;
        Self::from_layout(layout)
    }

    pub fn from_layout(layout: PageLayout) -> Result<Self, LayoutError> {
        for (p, paragraph) in layout.paragraphs.iter().enumerate() {
            let count = paragraph.symbols.len();
            for hint in paragraph.hints.iter().chain(&paragraph.alt_hints) {
                if hint.begin > hint.end || hint.end >= count {
                    return Err(LayoutError::invalid_index(format!(
                        "paragraph {} hint {}..={} outside {} symbols",
                        p, hint.begin, hint.end, count
                    )));
                }
            }
        }

        let mut cluster_of = vec![None; layout.paragraphs.len()];
        for (c, cluster) in layout.clusters.iter().enumerate() {
            for &p in &cluster.paragraphs {
                let slot = cluster_of.get_mut(p).ok_or_else(|| {
                    LayoutError::invalid_index(format!(
                        "cluster {} references paragraph {} of {}",
                        c,
                        p,
                        layout.paragraphs.len()
                    ))
                })?;
                *slot = Some(c);
            }
        }

        Ok(Self {
            resolution: layout.resolution,
            paragraphs: layout.paragraphs,
            clusters: layout.clusters,
            cluster_of,
        })
    }

    /// Cluster containing a paragraph, if any.
    pub fn cluster_of(&self, paragraph: usize) -> Option<usize> {
        self.cluster_of.get(paragraph).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

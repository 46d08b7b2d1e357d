//! Tile manifest: which file holds which pages at which mip level.
//!
//! ```json
//! {
//!   "page_count": 120,
//!   "page_width": 1600,
//!   "page_height": 2400,
//!   "levels": [
//!     { "per_page": { "path": "tiles/0/{page}.mip" } },
//!     { "batched": { "pages_per_file": 8, "path": "tiles/1/{file}.mip" } }
//!   ]
//! }
//! ```
//!
//! Level 0 is the finest; each following level halves the page size.
//! Batched paths may use `{file}` (batch index) or `{first}` (first page).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid manifest: {message}")]
    Invalid { message: String },
}

impl ManifestError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelLayout {
    /// One file per page
    PerPage { path: String },
    /// Consecutive pages grouped into one file
    Batched { pages_per_file: usize, path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub page_count: usize,
    /// Native page size at level 0
    pub page_width: u32,
    pub page_height: u32,
    pub levels: Vec<LevelLayout>,
}

/// One fetchable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipFileInfo {
    pub index: usize,
    pub name: String,
    pub level: usize,
    pub first_page: usize,
    pub page_count: usize,
}

impl MipFileInfo {
    pub fn pages(&self) -> std::ops::Range<usize> {
        self.first_page..self.first_page + self.page_count
    }

    /// Distance from a page to the closest page this file covers.
    pub fn distance_to(&self, page: usize) -> usize {
        if page < self.first_page {
            self.first_page - page
        } else if page >= self.first_page + self.page_count {
            page + 1 - (self.first_page + self.page_count)
        } else {
            0
        }
    }
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.page_count == 0 {
            return Err(ManifestError::invalid("no pages"));
        }
        if self.levels.is_empty() {
            return Err(ManifestError::invalid("no mip levels"));
        }
        if self.page_width == 0 || self.page_height == 0 {
            return Err(ManifestError::invalid("zero page size"));
        }
        for (level, layout) in self.levels.iter().enumerate() {
            if let LevelLayout::Batched { pages_per_file: 0, .. } = layout {
                return Err(ManifestError::invalid(format!(
                    "level {} batches zero pages per file",
                    level
                )));
            }
        }
        Ok(())
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Expected page size at a level.
    pub fn level_size(&self, level: usize) -> (u32, u32) {
        let shrink = |v: u32| (v >> level.min(31)).max(1);
        (shrink(self.page_width), shrink(self.page_height))
    }

    /// Expand into file descriptors, ordered by level then first page.
    pub fn files(&self) -> Vec<MipFileInfo> {
        let mut files = Vec::new();
        for (level, layout) in self.levels.iter().enumerate() {
            match layout {
                LevelLayout::PerPage { path } => {
                    for page in 0..self.page_count {
                        files.push(MipFileInfo {
                            index: files.len(),
                            name: path.replace("{page}", &page.to_string()),
                            level,
                            first_page: page,
                            page_count: 1,
                        });
                    }
                }
                LevelLayout::Batched {
                    pages_per_file,
                    path,
                } => {
                    let per_file = (*pages_per_file).max(1);
                    for (batch, first) in (0..self.page_count).step_by(per_file).enumerate() {
                        files.push(MipFileInfo {
                            index: files.len(),
                            name: path
                                .replace("{file}", &batch.to_string())
                                .replace("{first}", &first.to_string()),
                            level,
                            first_page: first,
                            page_count: per_file.min(self.page_count - first),
                        });
                    }
                }
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "page_count": 5,
        "page_width": 800,
        "page_height": 1200,
        "levels": [
            { "per_page": { "path": "l0/{page}.mip" } },
            { "batched": { "pages_per_file": 2, "path": "l1/{file}-{first}.mip" } }
        ]
    }"#;

    #[test]
    fn test_files_expand_levels() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        let files = manifest.files();
        assert_eq!(files.len(), 5 + 3);
        assert_eq!(files[2].name, "l0/2.mip");
        assert_eq!(files[5].name, "l1/0-0.mip");
        assert_eq!(files[7].name, "l1/2-4.mip");
        assert_eq!(files[7].page_count, 1);
        assert_eq!(files[6].pages(), 2..4);
        assert!(files.iter().enumerate().all(|(i, f)| f.index == i));
    }

    #[test]
    fn test_level_size_halves() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.level_size(0), (800, 1200));
        assert_eq!(manifest.level_size(1), (400, 600));
    }

    #[test]
    fn test_distance_to() {
        let file = MipFileInfo {
            index: 0,
            name: String::new(),
            level: 0,
            first_page: 4,
            page_count: 2,
        };
        assert_eq!(file.distance_to(4), 0);
        assert_eq!(file.distance_to(5), 0);
        assert_eq!(file.distance_to(6), 1);
        assert_eq!(file.distance_to(1), 3);
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            Manifest::from_json(r#"{"page_count": 0, "page_width": 1, "page_height": 1, "levels": []}"#),
            Err(ManifestError::Invalid { .. })
        ));
        assert!(matches!(Manifest::from_json("[]"), Err(ManifestError::Json(_))));
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A positioned text fragment as rendered on a page.
///
/// Coordinates are page-relative with the origin at the bottom-left, so a
/// larger `y` sits higher on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Rendered width of the run, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl GlyphRun {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width: None,
        }
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    #[serde(default)]
    pub glyphs: Vec<GlyphRun>,
}

/// All glyph runs of one uploaded statement, page by page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source identity, usually the uploaded file name.
    pub source: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(source: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            source: source.into(),
            pages,
        }
    }

    pub fn glyph_count(&self) -> usize {
        self.pages.iter().map(|p| p.glyphs.len()).sum()
    }
}

/// Read a glyph document from its JSON form.
pub fn load_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;
    let doc = serde_json::from_str(&content)?;
    Ok(doc)
}

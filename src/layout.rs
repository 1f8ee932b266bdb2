use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::document::{Document, GlyphRun, Page};
use crate::error::{LedgerError, Result};

/// Name reported in diagnostics for this reconstruction strategy.
pub const ENGINE: &str = "glyph-baseline-layout";

/// Inserted between runs that sit in different table columns.
const COLUMN_BREAK: &str = "   ";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Estimated width of one rendered character, in page units.
    pub char_width: f64,
    /// Gap, in characters, above which two runs are treated as separate columns.
    pub column_gap_chars: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            char_width: 5.0,
            column_gap_chars: 4.0,
        }
    }
}

impl LayoutOptions {
    fn column_gap(&self) -> f64 {
        self.char_width * self.column_gap_chars
    }

    fn run_end(&self, run: &GlyphRun) -> f64 {
        match run.width {
            Some(w) => run.x + w,
            None => run.x + run.text.chars().count() as f64 * self.char_width,
        }
    }
}

/// One reading-order line: runs sharing a rounded baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub page: usize,
    /// Rounded baseline. Meaningless for page separators.
    pub y: i64,
    pub runs: Vec<GlyphRun>,
    pub text: String,
}

impl TextLine {
    fn separator(page: usize) -> Self {
        Self {
            page,
            y: 0,
            runs: Vec::new(),
            text: String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

impl AsRef<str> for TextLine {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedText {
    /// Lines of every page in order, with a blank line between pages.
    pub lines: Vec<TextLine>,
    pub raw: String,
    pub engine: &'static str,
    pub char_count: usize,
    /// Numbers of pages that could not be read.
    pub skipped_pages: Vec<usize>,
}

impl ReconstructedText {
    pub fn text_lines(&self) -> impl Iterator<Item = &TextLine> {
        self.lines.iter().filter(|l| !l.is_blank())
    }
}

fn validate_page(page: &Page) -> Result<()> {
    for run in &page.glyphs {
        let width_ok = run.width.map_or(true, |w| w.is_finite() && w >= 0.0);
        if !run.x.is_finite() || !run.y.is_finite() || !width_ok {
            return Err(LedgerError::MalformedPage {
                page: page.number,
                reason: format!("run {:?} has an invalid position", run.text),
            });
        }
    }
    Ok(())
}

fn join_runs(runs: &[&GlyphRun], opts: &LayoutOptions) -> String {
    let mut text = String::new();
    for (i, run) in runs.iter().enumerate() {
        text.push_str(&run.text);
        if let Some(next) = runs.get(i + 1) {
            let gap = next.x - opts.run_end(run);
            if gap > opts.column_gap() {
                text.push_str(COLUMN_BREAK);
            } else if gap > 0.0 {
                text.push(' ');
            }
        }
    }
    text.trim().to_string()
}

/// Group one page's runs into lines, top of the page first.
pub fn reconstruct_page(page: &Page, opts: &LayoutOptions) -> Result<Vec<TextLine>> {
    validate_page(page)?;

    let mut buckets: BTreeMap<i64, Vec<&GlyphRun>> = BTreeMap::new();
    for run in &page.glyphs {
        if run.text.trim().is_empty() {
            continue;
        }
        buckets.entry(run.y.round() as i64).or_default().push(run);
    }

    let mut lines = Vec::with_capacity(buckets.len());
    for (y, mut runs) in buckets.into_iter().rev() {
        // stable sort: runs at the same x keep their source order
        runs.sort_by(|a, b| a.x.total_cmp(&b.x));
        let text = join_runs(&runs, opts);
        if text.is_empty() {
            continue;
        }
        lines.push(TextLine {
            page: page.number,
            y,
            runs: runs.into_iter().cloned().collect(),
            text,
        });
    }
    Ok(lines)
}

/// Reconstruct every page of a document. Pages are processed in parallel;
/// unreadable pages are logged and skipped.
pub fn reconstruct_document(doc: &Document, opts: &LayoutOptions) -> ReconstructedText {
    let per_page: Vec<Result<Vec<TextLine>>> = doc
        .pages
        .par_iter()
        .map(|page| reconstruct_page(page, opts))
        .collect();

    let last = per_page.len().saturating_sub(1);
    let mut lines = Vec::new();
    let mut skipped_pages = Vec::new();
    for (i, (page, result)) in doc.pages.iter().zip(per_page).enumerate() {
        match result {
            Ok(page_lines) => lines.extend(page_lines),
            Err(e) => {
                warn!(source = %doc.source, page = page.number, error = %e, "skipping unreadable page");
                skipped_pages.push(page.number);
            }
        }
        if i < last {
            lines.push(TextLine::separator(page.number));
        }
    }

    let raw = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let char_count = raw.chars().count();
    debug!(
        source = %doc.source,
        pages = doc.pages.len(),
        lines = lines.len(),
        chars = char_count,
        "reconstructed document"
    );

    ReconstructedText {
        lines,
        raw,
        engine: ENGINE,
        char_count,
        skipped_pages,
    }
}

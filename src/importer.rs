use std::path::Path;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::document::{load_document, Document};
use crate::error::Result;
use crate::extract::{extract_with, ExtractOptions, Extraction};
use crate::grammar::GrammarKind;
use crate::merge::Ledger;
use crate::models::MonthSummary;
use crate::store::LedgerStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub source: String,
    pub grammar: GrammarKind,
    /// Rows the grammar produced.
    pub extracted: usize,
    /// Rows newly written to the ledger.
    pub admitted: usize,
    pub duplicates: usize,
    pub discarded: usize,
    pub summaries: Vec<MonthSummary>,
    pub skipped_pages: Vec<usize>,
}

impl ImportResult {
    /// True when the document yielded no transactions at all.
    pub fn is_empty(&self) -> bool {
        self.extracted == 0
    }
}

fn merge_extraction<S: LedgerStore>(
    ledger: &Ledger<S>,
    owner: &str,
    extraction: Extraction,
) -> Result<ImportResult> {
    let outcome = ledger.merge(owner, &extraction.source, &extraction.transactions)?;
    Ok(ImportResult {
        extracted: extraction.transactions.len(),
        admitted: outcome.admitted.len(),
        duplicates: outcome.duplicates,
        discarded: outcome.discarded,
        summaries: outcome.updated_summaries,
        skipped_pages: extraction.skipped_pages,
        grammar: extraction.grammar,
        source: extraction.source,
    })
}

/// Extract one statement and merge its rows into `owner`'s ledger.
pub fn import_document<S: LedgerStore>(
    ledger: &Ledger<S>,
    document: &Document,
    owner: &str,
    opts: &ExtractOptions,
) -> Result<ImportResult> {
    let extraction = extract_with(document, opts);
    if extraction.is_empty() {
        warn!(source = %document.source, "statement produced no transactions");
    }
    merge_extraction(ledger, owner, extraction)
}

/// Load a glyph document from disk and import it.
pub fn import_path<S: LedgerStore>(
    ledger: &Ledger<S>,
    path: &Path,
    owner: &str,
    opts: &ExtractOptions,
) -> Result<ImportResult> {
    let document = load_document(path)?;
    import_document(ledger, &document, owner, opts)
}

/// Import several statements for one owner.
///
/// Extraction runs in parallel; merges run in document order so results
/// line up with `documents`.
pub fn import_batch<S: LedgerStore>(
    ledger: &Ledger<S>,
    documents: &[Document],
    owner: &str,
    opts: &ExtractOptions,
) -> Result<Vec<ImportResult>> {
    let extractions: Vec<Extraction> = documents.par_iter().map(|d| extract_with(d, opts)).collect();

    let mut results = Vec::with_capacity(extractions.len());
    for extraction in extractions {
        results.push(merge_extraction(ledger, owner, extraction)?);
    }
    let admitted: usize = results.iter().map(|r| r.admitted).sum();
    info!(owner, documents = results.len(), admitted, "batch import complete");
    Ok(results)
}

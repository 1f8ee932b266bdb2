//! Bank statement ingestion: positioned glyphs in, a deduplicated monthly
//! ledger out.
//!
//! A [`Document`] is reconstructed into reading-order lines, a statement
//! grammar pulls [`RawTransaction`]s out of those lines, and a [`Ledger`]
//! admits each transaction once by [`fingerprint`] while keeping running
//! [`MonthSummary`] totals.

#[cfg(feature = "sqlite")]
pub mod db;
pub mod document;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod grammar;
pub mod importer;
pub mod layout;
pub mod merchants;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod settings;
pub mod store;

#[cfg(feature = "sqlite")]
pub use db::SqliteStore;
pub use document::{load_document, Document, GlyphRun, Page};
pub use error::{LedgerError, Result};
pub use extract::{extract, extract_with, ExtractOptions, Extraction};
pub use fingerprint::{fingerprint, Fingerprint};
pub use grammar::{select_grammar, GrammarKind, SignConvention};
pub use importer::{import_batch, import_document, import_path, ImportResult};
pub use layout::{reconstruct_document, LayoutOptions, ReconstructedText, TextLine};
pub use merchants::MerchantAliases;
pub use merge::{Ledger, MergeOutcome};
pub use models::{MonthSummary, RawTransaction, Transaction};
pub use settings::{load_settings, save_settings, Settings};
pub use store::{LedgerStore, MemoryStore};

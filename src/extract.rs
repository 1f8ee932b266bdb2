use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use tracing::{info, trace};

use crate::document::Document;
use crate::grammar::{select_grammar, GrammarKind, SignConvention};
use crate::layout::{reconstruct_document, LayoutOptions};
use crate::models::RawTransaction;
use crate::normalize::{normalize_amount, normalize_date, normalize_description, parse_iso_date};

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub layout: LayoutOptions,
    /// Year for `MM/DD` rows when the statement prints no full date.
    /// Defaults to [`DEFAULT_STATEMENT_YEAR`].
    pub fallback_year: Option<i32>,
    /// Use this grammar instead of detecting one from the text.
    pub grammar: Option<GrammarKind>,
    pub sign_overrides: HashMap<GrammarKind, SignConvention>,
}

impl ExtractOptions {
    pub fn sign_for(&self, grammar: GrammarKind) -> SignConvention {
        self.sign_overrides
            .get(&grammar)
            .copied()
            .unwrap_or_else(|| grammar.sign_convention())
    }
}

/// Transactions found in one document plus reconstruction diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub source: String,
    pub grammar: GrammarKind,
    pub transactions: Vec<RawTransaction>,
    pub engine: &'static str,
    pub char_count: usize,
    pub skipped_pages: Vec<usize>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Statement calendar
// ---------------------------------------------------------------------------

/// Year given to `MM/DD` rows when neither the statement nor the options
/// supply one. Fixed so fingerprints of yearless rows are stable over time.
pub const DEFAULT_STATEMENT_YEAR: i32 = 2025;

const AMOUNT_NUMBER: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}";

fn full_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"\b(?:\d{1,2}/\d{1,2}/\d{4}",
            r"|(?:January|February|March|April|May|June|July|August|September|October|November|December",
            r"|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec) \d{1,2}, \d{4})\b",
        ))
        .expect("valid full date regex")
    })
}

/// Supplies the year for rows printed as `MM/DD`.
///
/// The latest full date in the statement is taken as its closing date;
/// rows from a later month than the closing month belong to the year before.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatementCalendar {
    closing: Option<NaiveDate>,
    fallback_year: i32,
}

impl StatementCalendar {
    pub fn infer<L: AsRef<str>>(lines: &[L], fallback_year: Option<i32>) -> Self {
        let closing = lines
            .iter()
            .flat_map(|l| {
                full_date_re()
                    .find_iter(l.as_ref())
                    .filter_map(|m| parse_iso_date(&normalize_date(m.as_str())))
                    .collect::<Vec<_>>()
            })
            .max();
        Self {
            closing,
            fallback_year: fallback_year.unwrap_or(DEFAULT_STATEMENT_YEAR),
        }
    }

    pub fn closing(&self) -> Option<NaiveDate> {
        self.closing
    }

    /// ISO date for a `MM/DD` token, or `None` if it is not a real date.
    pub fn resolve(&self, month_day: &str) -> Option<String> {
        let (month, day) = month_day.split_once(|c: char| c == '/' || c == '-')?;
        let month_num: u32 = month.parse().ok()?;
        let year = match self.closing {
            Some(c) if month_num > c.month() => c.year() - 1,
            Some(c) => c.year(),
            None => self.fallback_year,
        };
        let iso = normalize_date(&format!("{month}/{day}/{year}"));
        parse_iso_date(&iso).map(|_| iso)
    }
}

// ---------------------------------------------------------------------------
// Institution tables
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct TableSection {
    start: &'static str,
    end: &'static str,
}

/// A fixed-column transaction table bounded by section marker lines.
struct TableGrammar {
    sections: &'static [TableSection],
    row: fn() -> &'static Regex,
}

impl TableGrammar {
    fn section_started_by(&self, line: &str) -> Option<&'static TableSection> {
        self.sections.iter().find(|s| line.starts_with(s.start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    OutsideTable,
    InsideTable(&'static TableSection),
}

const BOFA_SECTIONS: &[TableSection] = &[
    TableSection {
        start: "Purchases and Adjustments",
        end: "TOTAL PURCHASES AND ADJUSTMENTS",
    },
    TableSection {
        start: "Payments and Other Credits",
        end: "TOTAL PAYMENTS AND OTHER CREDITS",
    },
];

// trans date, posting date, description, optional store number, reference,
// optional account digits, amount
fn bofa_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<trans>\d{2}/\d{2})\s+(?P<post>\d{2}/\d{2})\s+",
            r"(?P<desc>.+?)(?:\s+#\d+)?\s+",
            r"(?P<ref>\d{4,})(?:\s+(?P<acct>\d{4}))?\s+",
            r"(?P<amount>-?\$?[\d,]+\.\d{2})$",
        ))
        .expect("valid bofa row regex")
    })
}

static BOFA_CREDIT: TableGrammar = TableGrammar {
    sections: BOFA_SECTIONS,
    row: bofa_row_re,
};

const CHASE_SECTIONS: &[TableSection] = &[TableSection {
    start: "TRANSACTION DETAIL",
    end: "Ending Balance",
}];

// DATE DESCRIPTION AMOUNT BALANCE
fn chase_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<post>\d{2}/\d{2})\s+",
            r"(?P<desc>.+?)\s+",
            r"(?P<amount>-?[\d,]+\.\d{2})\s+",
            r"(?P<balance>-?[\d,]+\.\d{2})$",
        ))
        .expect("valid chase row regex")
    })
}

static CHASE_CHECKING: TableGrammar = TableGrammar {
    sections: CHASE_SECTIONS,
    row: chase_row_re,
};

fn table_row(
    caps: &Captures,
    calendar: &StatementCalendar,
    sign: SignConvention,
) -> Option<RawTransaction> {
    let posting_date = calendar.resolve(&caps["post"])?;
    let description = normalize_description(&caps["desc"]);
    if description.is_empty() {
        return None;
    }
    Some(RawTransaction {
        posting_date,
        description,
        amount: sign.apply(normalize_amount(&caps["amount"])),
        reference_number: caps.name("ref").map(|m| m.as_str().to_string()),
    })
}

fn extract_table<L: AsRef<str>>(
    lines: &[L],
    table: &TableGrammar,
    calendar: &StatementCalendar,
    sign: SignConvention,
) -> Vec<RawTransaction> {
    let mut state = TableState::OutsideTable;
    let mut out = Vec::new();

    for line in lines {
        let line = normalize_description(line.as_ref());
        state = match state {
            TableState::OutsideTable => match table.section_started_by(&line) {
                Some(section) => TableState::InsideTable(section),
                None => TableState::OutsideTable,
            },
            TableState::InsideTable(section) if line.starts_with(section.end) => {
                TableState::OutsideTable
            }
            TableState::InsideTable(section) => {
                let row = (table.row)()
                    .captures(&line)
                    .and_then(|caps| table_row(&caps, calendar, sign));
                match row {
                    Some(txn) => out.push(txn),
                    None => trace!(line = %line, "skipping non-transaction row inside table"),
                }
                TableState::InsideTable(section)
            }
        };
    }
    out
}

// ---------------------------------------------------------------------------
// Generic grammar
// ---------------------------------------------------------------------------

fn generic_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?P<date>\b(?:\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}[/-]\d{{1,2}}(?:[/-]\d{{2,4}})?)\b).*?(?P<amount>\(\$?{n}\)|\$-{n}\b|-?\$?{n}\b)",
            n = AMOUNT_NUMBER,
        );
        Regex::new(&pattern).expect("valid generic row regex")
    })
}

fn generic_date(token: &str, calendar: &StatementCalendar) -> Option<String> {
    let parts: Vec<&str> = token.split(|c: char| c == '/' || c == '-').collect();
    let iso = match parts.as_slice() {
        [y, _, _] if y.len() == 4 => normalize_date(token),
        [m, d, y] => normalize_date(&format!("{m}/{d}/{y}")),
        [_, _] => return calendar.resolve(token),
        _ => return None,
    };
    parse_iso_date(&iso).map(|_| iso)
}

fn generic_row(
    line: &str,
    calendar: &StatementCalendar,
    sign: SignConvention,
) -> Option<RawTransaction> {
    let line = normalize_description(line);
    let caps = generic_row_re().captures(&line)?;
    let date_text = &caps["date"];
    let amount_text = &caps["amount"];

    let posting_date = generic_date(date_text, calendar)?;
    let description = normalize_description(
        &line.replacen(date_text, "", 1).replacen(amount_text, "", 1),
    );
    if description.is_empty() {
        return None;
    }
    Some(RawTransaction {
        posting_date,
        description,
        amount: sign.apply(normalize_amount(amount_text)),
        reference_number: None,
    })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply one grammar to reconstructed lines.
pub fn extract_with_grammar<L: AsRef<str>>(
    lines: &[L],
    grammar: GrammarKind,
    opts: &ExtractOptions,
) -> Vec<RawTransaction> {
    let calendar = StatementCalendar::infer(lines, opts.fallback_year);
    let sign = opts.sign_for(grammar);
    match grammar {
        GrammarKind::BofaCredit => extract_table(lines, &BOFA_CREDIT, &calendar, sign),
        GrammarKind::ChaseChecking => extract_table(lines, &CHASE_CHECKING, &calendar, sign),
        GrammarKind::Generic => lines
            .iter()
            .filter_map(|l| generic_row(l.as_ref(), &calendar, sign))
            .collect(),
    }
}

/// Select a grammar for the lines (unless one is forced) and apply it.
pub fn extract_lines<L: AsRef<str>>(
    lines: &[L],
    opts: &ExtractOptions,
) -> (GrammarKind, Vec<RawTransaction>) {
    let grammar = opts.grammar.unwrap_or_else(|| {
        let text = lines.iter().map(|l| l.as_ref()).collect::<Vec<_>>().join("\n");
        select_grammar(&text)
    });
    (grammar, extract_with_grammar(lines, grammar, opts))
}

/// Reconstruct a document's lines and extract its transactions.
pub fn extract_with(document: &Document, opts: &ExtractOptions) -> Extraction {
    let text = reconstruct_document(document, &opts.layout);
    let grammar = opts.grammar.unwrap_or_else(|| select_grammar(&text.raw));
    info!(source = %document.source, grammar = grammar.key(), "selected statement grammar");

    let transactions = extract_with_grammar(&text.lines, grammar, opts);
    if transactions.is_empty() {
        info!(source = %document.source, "no transactions found");
    } else {
        info!(source = %document.source, count = transactions.len(), "extracted transactions");
    }

    Extraction {
        source: document.source.clone(),
        grammar,
        transactions,
        engine: text.engine,
        char_count: text.char_count,
        skipped_pages: text.skipped_pages,
    }
}

pub fn extract(document: &Document) -> Vec<RawTransaction> {
    extract_with(document, &ExtractOptions::default()).transactions
}

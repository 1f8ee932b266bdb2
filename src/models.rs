use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::fingerprint::fingerprint;
use crate::merchants::MerchantAliases;
use crate::normalize::parse_iso_date;

/// A candidate row pulled out of statement text, before deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// `YYYY-MM-DD`.
    pub posting_date: String,
    pub description: String,
    /// Signed as the grammar's sign convention dictates.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

/// A transaction as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub owner: String,
    pub source: String,
    pub posting_date: String,
    /// `YYYY-MM` bucket of `posting_date`.
    pub month: String,
    pub description: String,
    pub merchant: String,
    pub amount: f64,
    pub reference_number: Option<String>,
    pub fingerprint: String,
}

impl Transaction {
    pub fn from_raw(
        raw: &RawTransaction,
        owner: &str,
        source: &str,
        aliases: &MerchantAliases,
    ) -> Result<Self> {
        let month = month_key(&raw.posting_date)
            .ok_or_else(|| LedgerError::InvalidDate(raw.posting_date.clone()))?;
        Ok(Self {
            owner: owner.to_string(),
            source: source.to_string(),
            posting_date: raw.posting_date.clone(),
            month,
            description: raw.description.clone(),
            merchant: aliases.clean(&raw.description),
            amount: raw.amount,
            reference_number: raw.reference_number.clone(),
            fingerprint: fingerprint(raw, owner, source).into_string(),
        })
    }
}

/// Running spend and count for one owner and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub owner: String,
    /// `YYYY-MM`.
    pub month: String,
    /// English month name, e.g. "January".
    pub name: String,
    pub year: i32,
    pub total_spend: f64,
    pub transaction_count: i64,
}

impl MonthSummary {
    /// A zeroed summary for a month that has no rows yet.
    pub fn empty(owner: &str, month: &str) -> Self {
        let (name, year) = month_label(month);
        Self {
            owner: owner.to_string(),
            month: month.to_string(),
            name,
            year,
            total_spend: 0.0,
            transaction_count: 0,
        }
    }
}

/// `YYYY-MM` bucket for an ISO posting date.
pub fn month_key(posting_date: &str) -> Option<String> {
    parse_iso_date(posting_date).map(|d| d.format("%Y-%m").to_string())
}

/// Month name and year of a `YYYY-MM` key.
pub fn month_label(month: &str) -> (String, i32) {
    match parse_iso_date(&format!("{month}-01")) {
        Some(d) => (d.format("%B").to_string(), d.year()),
        None => (String::new(), 0),
    }
}

/// Round to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

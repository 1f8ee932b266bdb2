use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::RawTransaction;
use crate::normalize::{normalize_date, normalize_description_for_fingerprint};

/// ASCII unit separator. Control characters are stripped from every field,
/// so it can never occur inside one.
const FIELD_SEPARATOR: &str = "\u{1f}";

/// Hex SHA-256 digest identifying one real-world transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical_field(field: &str) -> String {
    field.chars().filter(|c| !c.is_control()).collect()
}

fn amount_field(amount: f64) -> String {
    // -0.00 and 0.00 must hash alike
    let cents = (amount * 100.0).round();
    if cents == 0.0 {
        "0.00".to_string()
    } else {
        format!("{:.2}", cents / 100.0)
    }
}

fn reliable_reference(txn: &RawTransaction) -> Option<&str> {
    txn.reference_number
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

fn digest(fields: &[&str]) -> Fingerprint {
    let base = fields
        .iter()
        .map(|f| canonical_field(f))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
        .to_uppercase();
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Dedup key for a transaction.
///
/// With a reference number the key is `owner | source | reference`;
/// otherwise `owner | date | amount | description`, with the description
/// stripped of volatile suffixes. Both forms are upper-cased before hashing.
pub fn fingerprint(txn: &RawTransaction, owner: &str, source: &str) -> Fingerprint {
    match reliable_reference(txn) {
        Some(reference) => digest(&[owner, source, reference]),
        None => {
            let date = normalize_date(&txn.posting_date);
            let amount = amount_field(txn.amount);
            let description = normalize_description_for_fingerprint(&txn.description);
            digest(&[owner, &date, &amount, &description])
        }
    }
}

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::merchants::MerchantAliases;
use crate::models::{round_cents, MonthSummary, RawTransaction, Transaction};
use crate::store::LedgerStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Rows written by this call, in candidate order.
    pub admitted: Vec<Transaction>,
    /// Summaries after this call's increments, one per touched month.
    pub updated_summaries: Vec<MonthSummary>,
    /// Candidates whose fingerprint was already stored.
    pub duplicates: usize,
    /// Candidates dropped because their posting date could not be bucketed.
    pub discarded: usize,
}

/// Deduplicating writer in front of a store.
pub struct Ledger<S> {
    store: S,
    aliases: MerchantAliases,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_aliases(store, MerchantAliases::default())
    }

    pub fn with_aliases(store: S, aliases: MerchantAliases) -> Self {
        Self { store, aliases }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn aliases(&self) -> &MerchantAliases {
        &self.aliases
    }

    /// Insert the candidates not seen before and add only those to their
    /// months' totals. Re-merging the same candidates is a no-op.
    pub fn merge(&self, owner: &str, source: &str, candidates: &[RawTransaction]) -> Result<MergeOutcome> {
        let mut outcome = MergeOutcome::default();
        if candidates.is_empty() {
            debug!(owner, source, "nothing to merge");
            return Ok(outcome);
        }

        let mut rows = Vec::with_capacity(candidates.len());
        for raw in candidates {
            match Transaction::from_raw(raw, owner, source, &self.aliases) {
                Ok(t) => rows.push(t),
                Err(LedgerError::InvalidDate(date)) => {
                    warn!(owner, source, posting_date = %date, "discarding candidate with unusable date");
                    outcome.discarded += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let admitted = self.store.insert_new(&rows)?;
        outcome.duplicates = rows.len().saturating_sub(admitted.len());

        let mut by_month: BTreeMap<&str, (f64, i64)> = BTreeMap::new();
        for t in &admitted {
            let entry = by_month.entry(t.month.as_str()).or_insert((0.0, 0));
            entry.0 += t.amount;
            entry.1 += 1;
        }
        for (month, (spend, count)) in &by_month {
            let summary = self.store.increment_month(owner, month, round_cents(*spend), *count)?;
            debug!(owner, month, total_spend = summary.total_spend, count = summary.transaction_count, "month updated");
            outcome.updated_summaries.push(summary);
        }

        info!(
            owner,
            source,
            admitted = admitted.len(),
            duplicates = outcome.duplicates,
            discarded = outcome.discarded,
            "merge complete"
        );
        outcome.admitted = admitted;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;

    fn raw(date: &str, desc: &str, amount: f64, reference: Option<&str>) -> RawTransaction {
        RawTransaction {
            posting_date: date.to_string(),
            description: desc.to_string(),
            amount,
            reference_number: reference.map(str::to_string),
        }
    }

    fn january() -> Vec<RawTransaction> {
        vec![
            raw("2025-01-03", "STARBUCKS STORE", 45.67, Some("4821")),
            raw("2025-01-09", "UBER TRIP", 12.10, None),
            raw("2025-02-01", "NETFLIX.COM", 15.49, None),
        ]
    }

    #[test]
    fn test_merge_is_idempotent() {
        let ledger = Ledger::new(MemoryStore::new());
        let first = ledger.merge("u1", "jan.pdf", &january()).unwrap();
        assert_eq!(first.admitted.len(), 3);
        assert_eq!(first.updated_summaries.len(), 2);

        let before = ledger.store().month_summaries("u1").unwrap();
        let second = ledger.merge("u1", "jan.pdf", &january()).unwrap();
        assert!(second.admitted.is_empty());
        assert!(second.updated_summaries.is_empty());
        assert_eq!(second.duplicates, 3);
        assert_eq!(ledger.store().month_summaries("u1").unwrap(), before);
    }

    #[test]
    fn test_totals_match_stored_rows() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger.merge("u1", "jan.pdf", &january()).unwrap();
        ledger
            .merge("u1", "late.pdf", &[raw("2025-01-20", "CVS PHARMACY", -3.30, None)])
            .unwrap();

        let rows = ledger.store().transactions("u1").unwrap();
        for summary in ledger.store().month_summaries("u1").unwrap() {
            let in_month: Vec<_> = rows.iter().filter(|t| t.month == summary.month).collect();
            let sum = round_cents(in_month.iter().map(|t| t.amount).sum());
            assert_eq!(summary.total_spend, sum, "month {}", summary.month);
            assert_eq!(summary.transaction_count, in_month.len() as i64);
        }
    }

    #[test]
    fn test_overlapping_statements_count_once() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger.merge("u1", "a.pdf", &[raw("2025-01-09", "UBER TRIP #77", 12.10, None)]).unwrap();
        let out = ledger
            .merge("u1", "b.pdf", &[raw("2025-01-09", "uber trip #78", 12.10, None)])
            .unwrap();
        assert_eq!(out.duplicates, 1);
        let s = ledger.store().month_summary("u1", "2025-01").unwrap().unwrap();
        assert_eq!(s.transaction_count, 1);
    }

    #[test]
    fn test_empty_candidates_write_nothing() {
        let ledger = Ledger::new(MemoryStore::new());
        let out = ledger.merge("u1", "empty.pdf", &[]).unwrap();
        assert_eq!(out, MergeOutcome::default());
        assert!(ledger.store().month_summaries("u1").unwrap().is_empty());
    }

    #[test]
    fn test_bad_date_is_discarded() {
        let ledger = Ledger::new(MemoryStore::new());
        let out = ledger
            .merge(
                "u1",
                "jan.pdf",
                &[raw("13/45", "GARBLED", 1.0, None), raw("2025-01-03", "OK", 2.0, None)],
            )
            .unwrap();
        assert_eq!(out.discarded, 1);
        assert_eq!(out.admitted.len(), 1);
        assert_eq!(out.updated_summaries[0].total_spend, 2.0);
    }

    #[test]
    fn test_merchant_from_injected_aliases() {
        let aliases = MerchantAliases::new([("blue bottle", "Blue Bottle Coffee")]);
        let ledger = Ledger::with_aliases(MemoryStore::new(), aliases);
        let out = ledger.merge("u1", "s", &[raw("2025-01-03", "BLUE BOTTLE #12", 6.0, None)]).unwrap();
        assert_eq!(out.admitted[0].merchant, "Blue Bottle Coffee");
    }

    // Reports every row twice, as a broken backend might.
    struct DoublingStore(MemoryStore);

    impl LedgerStore for DoublingStore {
        fn insert_new(&self, txns: &[Transaction]) -> Result<Vec<Transaction>> {
            let admitted = self.0.insert_new(txns)?;
            Ok(admitted.iter().chain(admitted.iter()).cloned().collect())
        }

        fn month_summary(&self, owner: &str, month: &str) -> Result<Option<MonthSummary>> {
            self.0.month_summary(owner, month)
        }

        fn increment_month(&self, owner: &str, month: &str, spend: f64, count: i64) -> Result<MonthSummary> {
            self.0.increment_month(owner, month, spend, count)
        }

        fn month_summaries(&self, owner: &str) -> Result<Vec<MonthSummary>> {
            self.0.month_summaries(owner)
        }

        fn transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
            self.0.transactions(owner)
        }
    }

    #[test]
    fn test_overreporting_store_does_not_underflow() {
        let ledger = Ledger::new(DoublingStore(MemoryStore::new()));
        let out = ledger.merge("u1", "jan.pdf", &january()).unwrap();
        assert_eq!(out.admitted.len(), 6);
        assert_eq!(out.duplicates, 0);
    }

    #[test]
    fn test_concurrent_merges_admit_once() {
        let ledger = Arc::new(Ledger::new(MemoryStore::new()));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.merge("u1", "jan.pdf", &january()).unwrap().admitted.len())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 3);

        let jan = ledger.store().month_summary("u1", "2025-01").unwrap().unwrap();
        assert_eq!(jan.transaction_count, 2);
        assert_eq!(jan.total_spend, 57.77);
    }
}

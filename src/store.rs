use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::{LedgerError, Result};
use crate::models::{round_cents, MonthSummary, Transaction};

/// Persistence contract the merge step runs against.
///
/// Both writes must be atomic with respect to concurrent callers: a
/// fingerprint is admitted at most once, and month increments never lose
/// updates.
pub trait LedgerStore {
    /// Insert every transaction whose fingerprint is not stored yet and
    /// return exactly those. Conflicting rows are dropped silently.
    fn insert_new(&self, txns: &[Transaction]) -> Result<Vec<Transaction>>;

    fn month_summary(&self, owner: &str, month: &str) -> Result<Option<MonthSummary>>;

    /// Add `spend` and `count` to a month's totals in one atomic step,
    /// starting from zero if the month has no summary yet.
    fn increment_month(&self, owner: &str, month: &str, spend: f64, count: i64) -> Result<MonthSummary>;

    fn month_summaries(&self, owner: &str) -> Result<Vec<MonthSummary>>;

    fn transactions(&self, owner: &str) -> Result<Vec<Transaction>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    fingerprints: HashSet<String>,
    transactions: Vec<Transaction>,
    months: BTreeMap<(String, String), MonthSummary>,
}

/// Process-local store, safe to share between threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Store("memory store lock poisoned".to_string()))
    }
}

impl LedgerStore for MemoryStore {
    fn insert_new(&self, txns: &[Transaction]) -> Result<Vec<Transaction>> {
        let mut state = self.lock()?;
        let mut admitted = Vec::new();
        for t in txns {
            if state.fingerprints.insert(t.fingerprint.clone()) {
                state.transactions.push(t.clone());
                admitted.push(t.clone());
            }
        }
        Ok(admitted)
    }

    fn month_summary(&self, owner: &str, month: &str) -> Result<Option<MonthSummary>> {
        let state = self.lock()?;
        Ok(state.months.get(&(owner.to_string(), month.to_string())).cloned())
    }

    fn increment_month(&self, owner: &str, month: &str, spend: f64, count: i64) -> Result<MonthSummary> {
        let mut state = self.lock()?;
        let summary = state
            .months
            .entry((owner.to_string(), month.to_string()))
            .or_insert_with(|| MonthSummary::empty(owner, month));
        summary.total_spend = round_cents(summary.total_spend + spend);
        summary.transaction_count += count;
        Ok(summary.clone())
    }

    fn month_summaries(&self, owner: &str) -> Result<Vec<MonthSummary>> {
        let state = self.lock()?;
        Ok(state
            .months
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect())
    }

    fn transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        let state = self.lock()?;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn txn(fingerprint: &str, month: &str, amount: f64) -> Transaction {
        Transaction {
            owner: "u1".to_string(),
            source: "jan.pdf".to_string(),
            posting_date: format!("{month}-15"),
            month: month.to_string(),
            description: "TEST".to_string(),
            merchant: "TEST".to_string(),
            amount,
            reference_number: None,
            fingerprint: fingerprint.to_string(),
        }
    }

    #[test]
    fn test_insert_new_reports_only_admitted() {
        let store = MemoryStore::new();
        let first = store.insert_new(&[txn("a", "2025-01", 1.0), txn("b", "2025-01", 2.0)]).unwrap();
        assert_eq!(first.len(), 2);
        let second = store.insert_new(&[txn("b", "2025-01", 2.0), txn("c", "2025-01", 3.0)]).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].fingerprint, "c");
        assert_eq!(store.transactions("u1").unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_within_one_batch() {
        let store = MemoryStore::new();
        let admitted = store.insert_new(&[txn("a", "2025-01", 1.0), txn("a", "2025-01", 1.0)]).unwrap();
        assert_eq!(admitted.len(), 1);
    }

    #[test]
    fn test_increment_creates_then_accumulates() {
        let store = MemoryStore::new();
        assert!(store.month_summary("u1", "2025-01").unwrap().is_none());
        store.increment_month("u1", "2025-01", 10.10, 1).unwrap();
        let s = store.increment_month("u1", "2025-01", 0.20, 2).unwrap();
        assert_eq!(s.total_spend, 10.3);
        assert_eq!(s.transaction_count, 3);
        assert_eq!(s.name, "January");
        assert_eq!(store.month_summary("u1", "2025-01").unwrap(), Some(s));
    }

    #[test]
    fn test_summaries_scoped_by_owner() {
        let store = MemoryStore::new();
        store.increment_month("u1", "2025-02", 5.0, 1).unwrap();
        store.increment_month("u1", "2025-01", 5.0, 1).unwrap();
        store.increment_month("u2", "2025-01", 7.0, 1).unwrap();
        let months: Vec<String> = store.month_summaries("u1").unwrap().into_iter().map(|s| s.month).collect();
        assert_eq!(months, vec!["2025-01", "2025-02"]);
    }

    #[test]
    fn test_concurrent_inserts_admit_once() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert_new(&[txn("shared", "2025-01", 1.0)]).unwrap().len())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.increment_month("u1", "2025-01", 1.0, 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = store.month_summary("u1", "2025-01").unwrap().unwrap();
        assert_eq!(s.transaction_count, 200);
        assert_eq!(s.total_spend, 200.0);
    }
}

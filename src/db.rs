use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::{LedgerError, Result};
use crate::models::{month_label, MonthSummary, Transaction};
use crate::store::LedgerStore;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    fingerprint TEXT NOT NULL UNIQUE,
    owner TEXT NOT NULL,
    source TEXT NOT NULL,
    posting_date TEXT NOT NULL,
    month TEXT NOT NULL,
    description TEXT NOT NULL,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    reference_number TEXT,
    category_id INTEGER,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transactions_owner_month ON transactions (owner, month);

CREATE TABLE IF NOT EXISTS months (
    owner TEXT NOT NULL,
    month TEXT NOT NULL,
    name TEXT NOT NULL,
    year INTEGER NOT NULL,
    total_spend REAL NOT NULL DEFAULT 0,
    transaction_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (owner, month)
);
";

// Only a fingerprint clash is ignored; any other constraint still errors.
const INSERT_TRANSACTION: &str = "
INSERT INTO transactions
    (fingerprint, owner, source, posting_date, month, description, merchant, amount, reference_number)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(fingerprint) DO NOTHING";

// Increment in place; never read-then-write.
const INCREMENT_MONTH: &str = "
INSERT INTO months (owner, month, name, year, total_spend, transaction_count)
VALUES (?1, ?2, ?3, ?4, ROUND(?5, 2), ?6)
ON CONFLICT(owner, month) DO UPDATE SET
    total_spend = ROUND(months.total_spend + excluded.total_spend, 2),
    transaction_count = months.transaction_count + excluded.transaction_count,
    updated_at = datetime('now')";

const SUMMARY_COLUMNS: &str = "owner, month, name, year, total_spend, transaction_count";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA busy_timeout=5000; PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<MonthSummary> {
    Ok(MonthSummary {
        owner: row.get(0)?,
        month: row.get(1)?,
        name: row.get(2)?,
        year: row.get(3)?,
        total_spend: row.get(4)?,
        transaction_count: row.get(5)?,
    })
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        owner: row.get(0)?,
        source: row.get(1)?,
        posting_date: row.get(2)?,
        month: row.get(3)?,
        description: row.get(4)?,
        merchant: row.get(5)?,
        amount: row.get(6)?,
        reference_number: row.get(7)?,
        fingerprint: row.get(8)?,
    })
}

/// SQLite-backed ledger. Several stores may open the same file; the unique
/// fingerprint and the single-statement upsert keep them consistent.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Store("sqlite connection lock poisoned".to_string()))
    }
}

impl LedgerStore for SqliteStore {
    fn insert_new(&self, txns: &[Transaction]) -> Result<Vec<Transaction>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut admitted = Vec::new();
        {
            let mut stmt = tx.prepare_cached(INSERT_TRANSACTION)?;
            for t in txns {
                let changed = stmt.execute(params![
                    t.fingerprint,
                    t.owner,
                    t.source,
                    t.posting_date,
                    t.month,
                    t.description,
                    t.merchant,
                    t.amount,
                    t.reference_number,
                ])?;
                if changed == 1 {
                    admitted.push(t.clone());
                }
            }
        }
        tx.commit()?;
        Ok(admitted)
    }

    fn month_summary(&self, owner: &str, month: &str) -> Result<Option<MonthSummary>> {
        let conn = self.lock()?;
        let summary = conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM months WHERE owner = ?1 AND month = ?2"),
                params![owner, month],
                row_to_summary,
            )
            .optional()?;
        Ok(summary)
    }

    fn increment_month(&self, owner: &str, month: &str, spend: f64, count: i64) -> Result<MonthSummary> {
        let mut conn = self.lock()?;
        let (name, year) = month_label(month);
        // immediate: the row read back is the one this call produced
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(INCREMENT_MONTH, params![owner, month, name, year, spend, count])?;
        let summary = tx.query_row(
            &format!("SELECT {SUMMARY_COLUMNS} FROM months WHERE owner = ?1 AND month = ?2"),
            params![owner, month],
            row_to_summary,
        )?;
        tx.commit()?;
        Ok(summary)
    }

    fn month_summaries(&self, owner: &str) -> Result<Vec<MonthSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM months WHERE owner = ?1 ORDER BY month"
        ))?;
        let rows = stmt
            .query_map(params![owner], row_to_summary)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT owner, source, posting_date, month, description, merchant, amount, reference_number, fingerprint
             FROM transactions WHERE owner = ?1 ORDER BY posting_date, id",
        )?;
        let rows = stmt
            .query_map(params![owner], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::sink::{format_rules, TIMESTAMP_FORMAT};
use crate::transaction::AnnotatedTransaction;

pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS flagged_transactions (
                run_id TEXT NOT NULL,
                row_idx INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                merchant TEXT NOT NULL,
                amount REAL NOT NULL,
                triggered_rules TEXT NOT NULL,
                suspicious INTEGER NOT NULL,
                PRIMARY KEY (run_id, row_idx)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    /// Persist one run's results in a single transaction.
    pub fn persist_run(&mut self, run_id: &str, results: &[AnnotatedTransaction]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO flagged_transactions
                 (run_id, row_idx, user_id, ts, merchant, amount, triggered_rules, suspicious)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (idx, r) in results.iter().enumerate() {
                let t = &r.transaction;
                stmt.execute(params![
                    run_id,
                    idx as i64,
                    t.user_id,
                    t.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    t.merchant,
                    t.amount,
                    format_rules(&r.triggered_rules),
                    r.suspicious as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_rows(&self, run_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM flagged_transactions WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn count_suspicious(&self, run_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM flagged_transactions WHERE run_id = ?1 AND suspicious = 1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{RuleFlagSet, Transaction};
    use chrono::NaiveDate;

    #[test]
    fn test_persist_and_count() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let results = vec![
            AnnotatedTransaction::new(
                Transaction::new("1", ts, "A", 20_000.0),
                RuleFlagSet { rule1: true, ..Default::default() },
            ),
            AnnotatedTransaction::new(Transaction::new("2", ts, "B", 5.0), RuleFlagSet::default()),
        ];
        let mut store = ResultStore::in_memory().unwrap();
        store.init().unwrap();
        store.persist_run("r-test", &results).unwrap();
        assert_eq!(store.count_rows("r-test").unwrap(), 2);
        assert_eq!(store.count_suspicious("r-test").unwrap(), 1);
        assert_eq!(store.count_rows("other").unwrap(), 0);
    }
}

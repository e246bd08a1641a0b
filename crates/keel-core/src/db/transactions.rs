//! Transaction operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::{parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{Direction, NewTransaction, Transaction};

/// Result of a batch transaction insert
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

impl Database {
    /// Insert a single transaction (skips duplicates based on import_hash)
    ///
    /// Returns the new row ID, or None if an identical import_hash already exists.
    pub fn insert_transaction(
        &self,
        user_id: i64,
        account_id: Option<i64>,
        tx: &NewTransaction,
    ) -> Result<Option<i64>> {
        let conn = self.conn()?;

        // Check for duplicate
        if let Some(hash) = &tx.import_hash {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM transactions WHERE user_id = ? AND import_hash = ?",
                    params![user_id, hash],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(None); // Duplicate, skip
            }
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, account_id, posted_at, description, counterparty, category, amount, direction, pending, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                account_id,
                tx.posted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                tx.description,
                tx.counterparty,
                tx.category,
                tx.amount.to_string(),
                tx.direction.as_str(),
                tx.pending as i64,
                tx.import_hash,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Insert a batch of transactions atomically, skipping duplicates
    ///
    /// All inserts happen in one transaction so a failed import never
    /// leaves a partial batch behind.
    pub fn insert_transactions(
        &self,
        user_id: i64,
        account_id: Option<i64>,
        txs: &[NewTransaction],
    ) -> Result<InsertOutcome> {
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;

        let mut outcome = InsertOutcome::default();

        for tx in txs {
            if let Some(hash) = &tx.import_hash {
                let existing: Option<i64> = db_tx
                    .query_row(
                        "SELECT id FROM transactions WHERE user_id = ? AND import_hash = ?",
                        params![user_id, hash],
                        |row| row.get(0),
                    )
                    .optional()?;

                if existing.is_some() {
                    outcome.duplicates += 1;
                    continue;
                }
            }

            db_tx.execute(
                r#"
                INSERT INTO transactions (user_id, account_id, posted_at, description, counterparty, category, amount, direction, pending, import_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    account_id,
                    tx.posted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    tx.description,
                    tx.counterparty,
                    tx.category,
                    tx.amount.to_string(),
                    tx.direction.as_str(),
                    tx.pending as i64,
                    tx.import_hash,
                ],
            )?;
            outcome.inserted += 1;
        }

        db_tx.commit()?;
        Ok(outcome)
    }

    /// List a user's transactions, newest first
    pub fn list_transactions(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, account_id, posted_at, description, counterparty, category, amount, direction, pending, import_hash, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY posted_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )?;

        let transactions = stmt
            .query_map(params![user_id, limit, offset], |row| {
                Self::row_to_transaction(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// All of a user's transactions posted at or after `since`, oldest first
    pub fn transactions_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, account_id, posted_at, description, counterparty, category, amount, direction, pending, import_hash, created_at
            FROM transactions
            WHERE user_id = ? AND posted_at >= ?
            ORDER BY posted_at ASC, id ASC
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![user_id, since.format("%Y-%m-%d %H:%M:%S").to_string()],
                |row| Self::row_to_transaction(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Settled debits with a resolved counterparty, oldest first
    ///
    /// This is the detection engine's input: pending rows and rows with
    /// no counterparty can't anchor a recurring pattern.
    pub fn debit_transactions_with_counterparty(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, account_id, posted_at, description, counterparty, category, amount, direction, pending, import_hash, created_at
            FROM transactions
            WHERE user_id = ? AND posted_at >= ?
              AND direction = 'debit' AND pending = 0 AND counterparty IS NOT NULL
            ORDER BY counterparty ASC, posted_at ASC, id ASC
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![user_id, since.format("%Y-%m-%d %H:%M:%S").to_string()],
                |row| Self::row_to_transaction(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Total settled debit volume in a category since a cutoff
    pub fn category_debit_total(
        &self,
        user_id: i64,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT amount FROM transactions
            WHERE user_id = ? AND posted_at >= ?
              AND direction = 'debit' AND pending = 0 AND category = ?
            "#,
        )?;

        let amounts = stmt
            .query_map(
                params![
                    user_id,
                    since.format("%Y-%m-%d %H:%M:%S").to_string(),
                    category
                ],
                |row| {
                    let s: String = row.get(0)?;
                    parse_money(0, s)
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(amounts.iter().sum())
    }

    /// Count a user's transactions
    pub fn count_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Date of the user's oldest transaction, if any
    pub fn earliest_transaction_date(&self, user_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let earliest: Option<String> = conn
            .query_row(
                "SELECT MIN(posted_at) FROM transactions WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(earliest.map(|s| parse_datetime(&s)))
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let posted_at_str: String = row.get(3)?;
        let amount_str: String = row.get(7)?;
        let direction_str: String = row.get(8)?;
        let pending_int: i64 = row.get(9)?;
        let created_at_str: String = row.get(11)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            account_id: row.get(2)?,
            posted_at: parse_datetime(&posted_at_str),
            description: row.get(4)?,
            counterparty: row.get(5)?,
            category: row.get(6)?,
            amount: parse_money(7, amount_str)?,
            direction: direction_str.parse().unwrap_or(Direction::Debit),
            pending: pending_int != 0,
            import_hash: row.get(10)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}

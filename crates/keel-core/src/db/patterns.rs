//! Recurring pattern operations
//!
//! Detection rewrites the `detected` rows wholesale on every run. The
//! rewrite is two-phase inside one transaction: new rows land with
//! staged = 1, the old detected generation is deleted, then the staged
//! flag clears. A crash mid-rewrite rolls the whole thing back, so
//! readers never observe a half-replaced generation. Manual rows are
//! never touched by the rewrite.

use rusqlite::params;

use super::{parse_date, parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{
    Confidence, Frequency, NewPattern, PatternOrigin, PatternStatus, RecurringPattern,
};

impl Database {
    /// Atomically replace the detected pattern generation
    ///
    /// Returns the number of patterns written.
    pub fn replace_detected_patterns(
        &self,
        user_id: i64,
        patterns: &[NewPattern],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Phase 1: stage the new generation
        for p in patterns {
            tx.execute(
                r#"
                INSERT INTO recurring_patterns
                    (user_id, counterparty, name, category, frequency, estimated_amount, amount_variance,
                     next_expected_date, last_observed_date, occurrence_count, confidence, origin, essential, staged)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                "#,
                params![
                    user_id,
                    p.counterparty,
                    p.name,
                    p.category,
                    p.frequency.as_str(),
                    p.estimated_amount.to_string(),
                    p.amount_variance.to_string(),
                    p.next_expected_date.to_string(),
                    p.last_observed_date.to_string(),
                    p.occurrence_count,
                    p.confidence.as_str(),
                    p.origin.as_str(),
                    p.essential as i64,
                ],
            )?;
        }

        // Phase 2: drop the previous detected generation, keep manual rows
        tx.execute(
            "DELETE FROM recurring_patterns WHERE user_id = ? AND origin = 'detected' AND staged = 0",
            params![user_id],
        )?;

        // Phase 3: promote the staged generation
        tx.execute(
            "UPDATE recurring_patterns SET staged = 0 WHERE user_id = ? AND staged = 1",
            params![user_id],
        )?;

        tx.commit()?;
        Ok(patterns.len())
    }

    /// Insert a manually declared bill
    pub fn insert_manual_pattern(&self, user_id: i64, p: &NewPattern) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO recurring_patterns
                (user_id, counterparty, name, category, frequency, estimated_amount, amount_variance,
                 next_expected_date, last_observed_date, occurrence_count, confidence, origin, essential)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                p.counterparty,
                p.name,
                p.category,
                p.frequency.as_str(),
                p.estimated_amount.to_string(),
                p.amount_variance.to_string(),
                p.next_expected_date.to_string(),
                p.last_observed_date.to_string(),
                p.occurrence_count,
                p.confidence.as_str(),
                p.origin.as_str(),
                p.essential as i64,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List a user's patterns, soonest due first
    pub fn list_patterns(&self, user_id: i64) -> Result<Vec<RecurringPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, counterparty, name, category, frequency, estimated_amount, amount_variance,
                   next_expected_date, last_observed_date, occurrence_count, confidence, status, origin,
                   essential, created_at, updated_at
            FROM recurring_patterns
            WHERE user_id = ? AND staged = 0
            ORDER BY next_expected_date ASC, id ASC
            "#,
        )?;

        let patterns = stmt
            .query_map(params![user_id], |row| Self::row_to_pattern(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    /// A user's active patterns, soonest due first
    pub fn active_patterns(&self, user_id: i64) -> Result<Vec<RecurringPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, counterparty, name, category, frequency, estimated_amount, amount_variance,
                   next_expected_date, last_observed_date, occurrence_count, confidence, status, origin,
                   essential, created_at, updated_at
            FROM recurring_patterns
            WHERE user_id = ? AND status = 'active' AND staged = 0
            ORDER BY next_expected_date ASC, id ASC
            "#,
        )?;

        let patterns = stmt
            .query_map(params![user_id], |row| Self::row_to_pattern(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    /// Get a pattern by ID
    pub fn get_pattern(&self, id: i64) -> Result<Option<RecurringPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                r#"
                SELECT id, user_id, counterparty, name, category, frequency, estimated_amount, amount_variance,
                       next_expected_date, last_observed_date, occurrence_count, confidence, status, origin,
                       essential, created_at, updated_at
                FROM recurring_patterns
                WHERE id = ?
                "#,
                params![id],
                |row| Self::row_to_pattern(row),
            )
            .ok();

        Ok(pattern)
    }

    /// Update a pattern's lifecycle status
    pub fn set_pattern_status(&self, pattern_id: i64, status: PatternStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE recurring_patterns SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![status.as_str(), pattern_id],
        )?;
        Ok(())
    }

    /// Mark a pattern as essential (or not)
    ///
    /// Essential bills are never counted as cancellable subscriptions.
    pub fn set_pattern_essential(&self, pattern_id: i64, essential: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE recurring_patterns SET essential = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![essential as i64, pattern_id],
        )?;
        Ok(())
    }

    pub(crate) fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<RecurringPattern> {
        let frequency_str: String = row.get(5)?;
        let amount_str: String = row.get(6)?;
        let variance_str: String = row.get(7)?;
        let next_expected_str: String = row.get(8)?;
        let last_observed_str: String = row.get(9)?;
        let confidence_str: String = row.get(11)?;
        let status_str: String = row.get(12)?;
        let origin_str: String = row.get(13)?;
        let essential_int: i64 = row.get(14)?;
        let created_at_str: String = row.get(15)?;
        let updated_at_str: String = row.get(16)?;

        Ok(RecurringPattern {
            id: row.get(0)?,
            user_id: row.get(1)?,
            counterparty: row.get(2)?,
            name: row.get(3)?,
            category: row.get(4)?,
            frequency: frequency_str.parse().unwrap_or(Frequency::Monthly),
            estimated_amount: parse_money(6, amount_str)?,
            amount_variance: parse_money(7, variance_str)?,
            next_expected_date: parse_date(&next_expected_str),
            last_observed_date: parse_date(&last_observed_str),
            occurrence_count: row.get(10)?,
            confidence: confidence_str.parse().unwrap_or(Confidence::Low),
            status: status_str.parse().unwrap_or(PatternStatus::Active),
            origin: origin_str.parse().unwrap_or(PatternOrigin::Detected),
            essential: essential_int != 0,
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}

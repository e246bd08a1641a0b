//! Recommendation batch operations
//!
//! A user has exactly one current batch. Replacing it deletes the old
//! rows and inserts the new ones in a single transaction, so readers
//! never see a mix of two batches.

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::explain::TemplateInputs;
use crate::models::{Confidence, Recommendation};
use crate::recommend::RankedAction;

impl Database {
    /// Atomically replace the user's recommendation batch
    ///
    /// An empty slice is valid: it clears the batch, which is what a user
    /// with no rankable candidates should see.
    pub fn replace_recommendations(&self, user_id: i64, actions: &[RankedAction]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM recommendations WHERE user_id = ?",
            params![user_id],
        )?;

        for action in actions {
            let inputs_json = serde_json::to_string(&action.inputs)?;
            tx.execute(
                r#"
                INSERT INTO recommendations
                    (user_id, candidate_id, rank, score, confidence, template_key, template_inputs_json, explanation, quick_win, batch_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    action.candidate_id,
                    action.rank,
                    action.score,
                    action.confidence.as_str(),
                    action.template_key,
                    inputs_json,
                    action.explanation,
                    action.quick_win,
                    action.batch_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// The user's current recommendation batch, rank 1 first
    pub fn current_recommendations(&self, user_id: i64) -> Result<Vec<Recommendation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, candidate_id, rank, score, confidence, template_key, template_inputs_json, explanation, quick_win, batch_id, created_at
            FROM recommendations
            WHERE user_id = ?
            ORDER BY rank ASC
            "#,
        )?;

        let recommendations = stmt
            .query_map(params![user_id], |row| Self::row_to_recommendation(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(recommendations)
    }

    fn row_to_recommendation(row: &rusqlite::Row) -> rusqlite::Result<Recommendation> {
        let confidence_str: String = row.get(5)?;
        let inputs_json: String = row.get(7)?;
        let created_at_str: String = row.get(11)?;

        let inputs: TemplateInputs = serde_json::from_str(&inputs_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Recommendation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            candidate_id: row.get(2)?,
            rank: row.get(3)?,
            score: row.get(4)?,
            confidence: confidence_str.parse().unwrap_or(Confidence::Medium),
            template_key: row.get(6)?,
            inputs,
            explanation: row.get(8)?,
            quick_win: row.get(9)?,
            batch_id: row.get(10)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}

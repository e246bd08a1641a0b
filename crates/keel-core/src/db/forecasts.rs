//! Forecast snapshot operations
//!
//! Snapshots are append-only. Writing a new forecast never mutates or
//! deletes an old one, so the history table doubles as an audit of how
//! the outlook changed over time.

use rusqlite::params;

use super::{parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::forecast::Forecast;
use crate::models::{Confidence, ForecastSnapshot};

impl Database {
    /// Append a forecast snapshot
    pub fn insert_forecast_snapshot(&self, forecast: &Forecast) -> Result<i64> {
        let conn = self.conn()?;

        let projection_json = serde_json::to_string(&forecast.projection)?;
        let inputs_json = serde_json::to_string(&forecast.confidence_inputs)?;
        let factors_json = serde_json::to_string(&forecast.urgency_factors)?;
        let assumptions_json = serde_json::to_string(&forecast.assumptions)?;

        conn.execute(
            r#"
            INSERT INTO forecast_snapshots (
                user_id, computed_at, current_balance, safe_to_spend_today, safe_to_spend_week,
                projection_json, confidence, confidence_inputs_json,
                urgency_score, urgency_factors_json, assumptions_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                forecast.user_id,
                forecast.computed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                forecast.current_balance.to_string(),
                forecast.safe_to_spend_today.to_string(),
                forecast.safe_to_spend_week.to_string(),
                projection_json,
                forecast.confidence.as_str(),
                inputs_json,
                forecast.urgency_score,
                factors_json,
                assumptions_json,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a forecast snapshot by ID
    pub fn get_forecast(&self, snapshot_id: i64) -> Result<Option<ForecastSnapshot>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            r#"
            SELECT id, user_id, computed_at, current_balance, safe_to_spend_today, safe_to_spend_week,
                   projection_json, confidence, confidence_inputs_json,
                   urgency_score, urgency_factors_json, assumptions_json, created_at
            FROM forecast_snapshots
            WHERE id = ?
            "#,
            params![snapshot_id],
            |row| Self::row_to_snapshot(row),
        );

        match result {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The most recent forecast for a user, if any
    pub fn latest_forecast(&self, user_id: i64) -> Result<Option<ForecastSnapshot>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            r#"
            SELECT id, user_id, computed_at, current_balance, safe_to_spend_today, safe_to_spend_week,
                   projection_json, confidence, confidence_inputs_json,
                   urgency_score, urgency_factors_json, assumptions_json, created_at
            FROM forecast_snapshots
            WHERE user_id = ?
            ORDER BY computed_at DESC, id DESC
            LIMIT 1
            "#,
            params![user_id],
            |row| Self::row_to_snapshot(row),
        );

        match result {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Recent forecast snapshots, newest first
    pub fn forecast_history(&self, user_id: i64, limit: i64) -> Result<Vec<ForecastSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, computed_at, current_balance, safe_to_spend_today, safe_to_spend_week,
                   projection_json, confidence, confidence_inputs_json,
                   urgency_score, urgency_factors_json, assumptions_json, created_at
            FROM forecast_snapshots
            WHERE user_id = ?
            ORDER BY computed_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let snapshots = stmt
            .query_map(params![user_id, limit], |row| Self::row_to_snapshot(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<ForecastSnapshot> {
        let computed_at_str: String = row.get(2)?;
        let balance_str: String = row.get(3)?;
        let today_str: String = row.get(4)?;
        let week_str: String = row.get(5)?;
        let projection_json: String = row.get(6)?;
        let confidence_str: String = row.get(7)?;
        let inputs_json: String = row.get(8)?;
        let factors_json: String = row.get(10)?;
        let assumptions_json: String = row.get(11)?;
        let created_at_str: String = row.get(12)?;

        Ok(ForecastSnapshot {
            id: row.get(0)?,
            user_id: row.get(1)?,
            computed_at: parse_datetime(&computed_at_str),
            current_balance: parse_money(3, balance_str)?,
            safe_to_spend_today: parse_money(4, today_str)?,
            safe_to_spend_week: parse_money(5, week_str)?,
            projection: serde_json::from_str(&projection_json).unwrap_or_default(),
            confidence: confidence_str.parse().unwrap_or(Confidence::Low),
            confidence_inputs: serde_json::from_str(&inputs_json).unwrap_or_default(),
            urgency_score: row.get(9)?,
            urgency_factors: serde_json::from_str(&factors_json).unwrap_or_default(),
            assumptions: serde_json::from_str(&assumptions_json).unwrap_or_default(),
            created_at: parse_datetime(&created_at_str),
        })
    }
}

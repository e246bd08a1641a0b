//! Audit trail operations

use rusqlite::params;

use super::{AuditRecord, Database};
use crate::error::Result;

impl Database {
    /// Record an audit event
    pub fn record_event(
        &self,
        user_id: i64,
        event_type: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO audit_events (user_id, event_type, entity_type, entity_id, details)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![user_id, event_type, entity_type, entity_id, details],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List recent audit events, newest first
    pub fn recent_events(&self, user_id: i64, limit: i64) -> Result<Vec<AuditRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, created_at, event_type, entity_type, entity_id, details
            FROM audit_events
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let entries = stmt
            .query_map(params![user_id, limit], |row| {
                let timestamp_str: String = row.get(1)?;
                Ok(AuditRecord {
                    id: row.get(0)?,
                    timestamp: timestamp_str,
                    event_type: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    details: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

//! Account operations

use rusqlite::params;
use rust_decimal::Decimal;

use super::{parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{Account, AccountKind};

impl Database {
    /// Create or get an account by name
    pub fn upsert_account(&self, user_id: i64, name: &str, kind: AccountKind) -> Result<i64> {
        let conn = self.conn()?;

        // Try to find existing account
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE user_id = ? AND name = ?",
                params![user_id, name],
                |row| row.get(0),
            )
            .ok();

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO accounts (user_id, name, kind) VALUES (?, ?, ?)",
            params![user_id, name, kind.as_str()],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Update an account's reported balances
    pub fn set_account_balances(
        &self,
        account_id: i64,
        current: Decimal,
        available: Option<Decimal>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE accounts SET current_balance = ?, available_balance = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![
                current.to_string(),
                available.map(|a| a.to_string()),
                account_id
            ],
        )?;
        Ok(())
    }

    /// List a user's accounts
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, kind, currency, current_balance, available_balance, created_at, updated_at
             FROM accounts WHERE user_id = ? ORDER BY name",
        )?;

        let accounts = stmt
            .query_map(params![user_id], |row| Self::row_to_account(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                "SELECT id, user_id, name, kind, currency, current_balance, available_balance, created_at, updated_at
                 FROM accounts WHERE id = ?",
                params![id],
                |row| Self::row_to_account(row),
            )
            .ok();

        Ok(account)
    }

    pub(crate) fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        let kind_str: String = row.get(3)?;
        let current_str: String = row.get(5)?;
        let available_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let available = match available_str {
            Some(s) => Some(parse_money(6, s)?),
            None => None,
        };

        Ok(Account {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: kind_str.parse().unwrap_or(AccountKind::Checking),
            currency: row.get(4)?,
            current_balance: parse_money(5, current_str)?,
            available_balance: available,
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}

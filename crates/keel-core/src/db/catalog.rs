//! Action catalog, goal, and action run operations

use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::{parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{
    ActionCandidate, ActionCategory, ActionRun, Difficulty, Goal, GoalStatus, RunStatus,
};

/// Built-in action catalog: (key, title, category, spend_category, difficulty, minutes, min, max)
///
/// Savings ranges are monthly dollars. The catalog is deliberately small;
/// ranking assumes every entry here is worth surfacing to somebody.
const DEFAULT_CATALOG: &[(
    &str,
    &str,
    ActionCategory,
    Option<&str>,
    Difficulty,
    i64,
    &str,
    &str,
)] = &[
    (
        "cancel_unused_subscriptions",
        "Cancel subscriptions you no longer use",
        ActionCategory::SubscriptionCancel,
        None,
        Difficulty::QuickWin,
        15,
        "10",
        "45",
    ),
    (
        "audit_streaming_overlap",
        "Drop overlapping streaming services",
        ActionCategory::SubscriptionCancel,
        None,
        Difficulty::QuickWin,
        20,
        "8",
        "30",
    ),
    (
        "trim_dining_out",
        "Cook at home two more nights a week",
        ActionCategory::SpendingCut,
        Some("dining"),
        Difficulty::Moderate,
        60,
        "40",
        "160",
    ),
    (
        "shopping_cooloff",
        "Add a 48-hour cool-off before non-essential purchases",
        ActionCategory::SpendingCut,
        Some("shopping"),
        Difficulty::QuickWin,
        5,
        "20",
        "100",
    ),
    (
        "entertainment_budget_cap",
        "Set a monthly entertainment cap",
        ActionCategory::SpendingCut,
        Some("entertainment"),
        Difficulty::Moderate,
        25,
        "15",
        "75",
    ),
    (
        "automate_savings_transfer",
        "Automate a weekly transfer to savings",
        ActionCategory::SavingsBoost,
        None,
        Difficulty::QuickWin,
        10,
        "20",
        "80",
    ),
    (
        "open_high_yield_savings",
        "Move cash to a high-yield savings account",
        ActionCategory::SavingsBoost,
        None,
        Difficulty::Moderate,
        45,
        "5",
        "50",
    ),
    (
        "snowball_smallest_debt",
        "Pay off your smallest balance first",
        ActionCategory::DebtReduction,
        None,
        Difficulty::Involved,
        90,
        "25",
        "150",
    ),
];

/// Which action categories advance which goal kinds
const DEFAULT_GOAL_CATEGORY_MAP: &[(&str, ActionCategory)] = &[
    ("emergency_fund", ActionCategory::SavingsBoost),
    ("debt_free", ActionCategory::DebtReduction),
    ("save_for_purchase", ActionCategory::SavingsBoost),
    ("save_for_purchase", ActionCategory::SpendingCut),
    ("reduce_spending", ActionCategory::SpendingCut),
    ("reduce_spending", ActionCategory::SubscriptionCancel),
];

impl Database {
    /// Seed the built-in action catalog and goal/category map
    ///
    /// Idempotent: existing keys are left alone, so re-running init never
    /// clobbers user edits to the catalog.
    pub fn seed_default_catalog(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;

        for (key, title, category, spend_category, difficulty, minutes, min, max) in
            DEFAULT_CATALOG
        {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM action_candidates WHERE key = ?",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                continue;
            }

            conn.execute(
                r#"
                INSERT INTO action_candidates (key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    key,
                    title,
                    category.as_str(),
                    spend_category,
                    difficulty.as_str(),
                    minutes,
                    min,
                    max
                ],
            )?;
            inserted += 1;
        }

        for (goal_kind, action_category) in DEFAULT_GOAL_CATEGORY_MAP {
            conn.execute(
                "INSERT OR IGNORE INTO goal_category_map (goal_kind, action_category) VALUES (?, ?)",
                params![goal_kind, action_category.as_str()],
            )?;
        }

        Ok(inserted)
    }

    /// List catalog entries
    pub fn list_candidates(&self, only_active: bool) -> Result<Vec<ActionCandidate>> {
        let conn = self.conn()?;
        let sql = if only_active {
            "SELECT id, key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active
             FROM action_candidates WHERE active = 1 ORDER BY id"
        } else {
            "SELECT id, key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active
             FROM action_candidates ORDER BY id"
        };

        let mut stmt = conn.prepare(sql)?;
        let candidates = stmt
            .query_map([], |row| Self::row_to_candidate(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    /// Get a catalog entry by ID
    pub fn get_candidate(&self, id: i64) -> Result<Option<ActionCandidate>> {
        let conn = self.conn()?;
        let candidate = conn
            .query_row(
                "SELECT id, key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active
                 FROM action_candidates WHERE id = ?",
                params![id],
                |row| Self::row_to_candidate(row),
            )
            .ok();

        Ok(candidate)
    }

    /// Get a catalog entry by its stable key
    pub fn get_candidate_by_key(&self, key: &str) -> Result<Option<ActionCandidate>> {
        let conn = self.conn()?;
        let candidate = conn
            .query_row(
                "SELECT id, key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active
                 FROM action_candidates WHERE key = ?",
                params![key],
                |row| Self::row_to_candidate(row),
            )
            .ok();

        Ok(candidate)
    }

    /// Add a goal
    pub fn add_goal(
        &self,
        user_id: i64,
        kind: &str,
        name: &str,
        target_amount: Option<Decimal>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO goals (user_id, kind, name, target_amount) VALUES (?, ?, ?, ?)",
            params![user_id, kind, name, target_amount.map(|a| a.to_string())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List all of a user's goals
    pub fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, name, target_amount, status, created_at
             FROM goals WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )?;

        let goals = stmt
            .query_map(params![user_id], |row| Self::row_to_goal(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    /// Get a goal by ID
    pub fn get_goal(&self, goal_id: i64) -> Result<Option<Goal>> {
        let conn = self.conn()?;
        let goal = conn
            .query_row(
                "SELECT id, user_id, kind, name, target_amount, status, created_at
                 FROM goals WHERE id = ?",
                params![goal_id],
                |row| Self::row_to_goal(row),
            )
            .ok();

        Ok(goal)
    }

    /// A user's active goals
    pub fn active_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, name, target_amount, status, created_at
             FROM goals WHERE user_id = ? AND status = 'active' ORDER BY created_at ASC, id ASC",
        )?;

        let goals = stmt
            .query_map(params![user_id], |row| Self::row_to_goal(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    /// Update a goal's status
    pub fn set_goal_status(&self, goal_id: i64, status: GoalStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE goals SET status = ? WHERE id = ?",
            params![status.as_str(), goal_id],
        )?;
        Ok(())
    }

    /// The goal kind to action category affinity map, in seeded order
    pub fn goal_category_map(&self) -> Result<Vec<(String, ActionCategory)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT goal_kind, action_category FROM goal_category_map ORDER BY id ASC")?;

        let entries = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let category_str: String = row.get(1)?;
                Ok((
                    kind,
                    category_str.parse().unwrap_or(ActionCategory::SavingsBoost),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Start a run of an action candidate
    pub fn start_action_run(&self, user_id: i64, candidate_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO action_runs (user_id, candidate_id) VALUES (?, ?)",
            params![user_id, candidate_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update a run's status, stamping completed_at on completion
    pub fn set_run_status(&self, run_id: i64, status: RunStatus) -> Result<()> {
        let conn = self.conn()?;
        if status == RunStatus::Completed {
            conn.execute(
                "UPDATE action_runs SET status = ?, completed_at = CURRENT_TIMESTAMP WHERE id = ?",
                params![status.as_str(), run_id],
            )?;
        } else {
            conn.execute(
                "UPDATE action_runs SET status = ? WHERE id = ?",
                params![status.as_str(), run_id],
            )?;
        }
        Ok(())
    }

    /// List a user's action runs, newest first
    pub fn list_action_runs(&self, user_id: i64) -> Result<Vec<ActionRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, candidate_id, status, started_at, completed_at
             FROM action_runs WHERE user_id = ? ORDER BY started_at DESC, id DESC",
        )?;

        let runs = stmt
            .query_map(params![user_id], |row| Self::row_to_run(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    /// Get an action run by ID
    pub fn get_action_run(&self, run_id: i64) -> Result<Option<ActionRun>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, user_id, candidate_id, status, started_at, completed_at
                 FROM action_runs WHERE id = ?",
                params![run_id],
                |row| Self::row_to_run(row),
            )
            .ok();

        Ok(run)
    }

    /// Candidate IDs the ranker must skip: any run that isn't abandoned
    ///
    /// In-progress and paused runs mean the user is already on it;
    /// completed means it's done. Only an abandoned run frees the
    /// candidate to be recommended again.
    pub fn excluded_candidate_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT candidate_id FROM action_runs WHERE user_id = ? AND status != 'abandoned'",
        )?;

        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    pub(crate) fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<ActionCandidate> {
        let category_str: String = row.get(3)?;
        let difficulty_str: String = row.get(5)?;
        let min_str: String = row.get(7)?;
        let max_str: String = row.get(8)?;
        let active_int: i64 = row.get(9)?;

        Ok(ActionCandidate {
            id: row.get(0)?,
            key: row.get(1)?,
            title: row.get(2)?,
            category: category_str.parse().unwrap_or(ActionCategory::SavingsBoost),
            spend_category: row.get(4)?,
            difficulty: difficulty_str.parse().unwrap_or(Difficulty::Moderate),
            est_minutes: row.get(6)?,
            min_savings: parse_money(7, min_str)?,
            max_savings: parse_money(8, max_str)?,
            active: active_int != 0,
        })
    }

    fn row_to_goal(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
        let target_str: Option<String> = row.get(4)?;
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;

        let target_amount = match target_str {
            Some(s) => Some(parse_money(4, s)?),
            None => None,
        };

        Ok(Goal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            name: row.get(3)?,
            target_amount,
            status: status_str.parse().unwrap_or(GoalStatus::Active),
            created_at: parse_datetime(&created_at_str),
        })
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<ActionRun> {
        let status_str: String = row.get(3)?;
        let started_at_str: String = row.get(4)?;
        let completed_at_str: Option<String> = row.get(5)?;

        Ok(ActionRun {
            id: row.get(0)?,
            user_id: row.get(1)?,
            candidate_id: row.get(2)?,
            status: status_str.parse().unwrap_or(RunStatus::InProgress),
            started_at: parse_datetime(&started_at_str),
            completed_at: completed_at_str.map(|s| parse_datetime(&s)),
        })
    }
}

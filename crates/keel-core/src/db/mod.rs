//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Account balances and metadata
//! - `transactions` - Transaction inserts and history queries
//! - `patterns` - Recurring pattern storage and the detection rewrite
//! - `forecasts` - Append-only forecast snapshots
//! - `catalog` - Action catalog, goals, and action runs
//! - `recommendations` - Ranked recommendation batches
//! - `audit` - Engine and import audit trail

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};

mod accounts;
mod audit;
mod catalog;
mod forecasts;
mod patterns;
mod recommendations;
mod transactions;

pub use transactions::InsertOutcome;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "KEEL_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"keel-salt-v1-fix";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    // Derive key using Argon2id
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    // Extract the hash portion for use as SQLCipher key (hex encoded)
    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a SQLite date string into a NaiveDate
pub(crate) fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

/// Parse a money column stored as a decimal string
///
/// Amounts are stored as TEXT so SQLite never coerces them through
/// floating point. A value that fails to parse is corrupt data, so it
/// surfaces as a column conversion error rather than a silent zero.
pub(crate) fn parse_money(idx: usize, s: String) -> rusqlite::Result<Decimal> {
    s.parse::<Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `KEEL_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `KEEL_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `KEEL_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/keel_test_{}.db", id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Performance pragmas for local storage (SSD/M.2 recommended)
            -- WAL mode: better concurrency, readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            -- FULL is safer but slower; NORMAL is safe for most power-loss scenarios
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Accounts (balances stored as decimal strings, never floats)
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,                         -- checking, savings, credit
                currency TEXT NOT NULL DEFAULT 'USD',
                current_balance TEXT NOT NULL DEFAULT '0',
                available_balance TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

            -- Transactions (immutable facts; amount is an absolute magnitude,
            -- direction carries the sign)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                account_id INTEGER REFERENCES accounts(id),
                posted_at DATETIME NOT NULL,
                description TEXT NOT NULL,
                counterparty TEXT,                          -- resolved merchant, NULL = unresolved
                category TEXT,
                amount TEXT NOT NULL,
                direction TEXT NOT NULL,                    -- debit, credit
                pending INTEGER NOT NULL DEFAULT 0,
                import_hash TEXT,                           -- sha256 for import deduplication
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_posted ON transactions(user_id, posted_at);
            CREATE INDEX IF NOT EXISTS idx_transactions_counterparty ON transactions(counterparty);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
            CREATE INDEX IF NOT EXISTS idx_transactions_import_hash ON transactions(import_hash);

            -- Recurring patterns (detected from history or declared by the user)
            CREATE TABLE IF NOT EXISTS recurring_patterns (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                counterparty TEXT,                          -- NULL only for manual bills
                name TEXT NOT NULL,
                category TEXT,
                frequency TEXT NOT NULL,                    -- weekly, biweekly, monthly, quarterly, annual
                estimated_amount TEXT NOT NULL,
                amount_variance TEXT NOT NULL DEFAULT '0',
                next_expected_date DATE NOT NULL,
                last_observed_date DATE NOT NULL,
                occurrence_count INTEGER NOT NULL,
                confidence TEXT NOT NULL,                   -- low, medium, high
                status TEXT NOT NULL DEFAULT 'active',      -- active, paused, ended
                origin TEXT NOT NULL,                       -- detected, manual
                essential INTEGER NOT NULL DEFAULT 0,
                staged INTEGER NOT NULL DEFAULT 0,          -- 1 while a detection rewrite is in flight
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_patterns_user_status ON recurring_patterns(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_patterns_origin ON recurring_patterns(origin);
            CREATE INDEX IF NOT EXISTS idx_patterns_next_expected ON recurring_patterns(next_expected_date);

            -- Forecast snapshots (append-only; newest row per user wins)
            CREATE TABLE IF NOT EXISTS forecast_snapshots (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                computed_at DATETIME NOT NULL,
                current_balance TEXT NOT NULL,
                safe_to_spend_today TEXT NOT NULL,
                safe_to_spend_week TEXT NOT NULL,
                projection_json TEXT NOT NULL,              -- JSON: 30 daily points with bands
                confidence TEXT NOT NULL,                   -- low, medium, high
                confidence_inputs_json TEXT NOT NULL,       -- JSON: evidence behind the grade
                urgency_score INTEGER NOT NULL,             -- 0..=100
                urgency_factors_json TEXT NOT NULL,         -- JSON: one sentence per fired rule
                assumptions_json TEXT NOT NULL,             -- JSON: what the projection assumes
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_forecasts_user_computed ON forecast_snapshots(user_id, computed_at);

            -- Action catalog (static, seeded at init)
            CREATE TABLE IF NOT EXISTS action_candidates (
                id INTEGER PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,                   -- stable key, e.g. "cancel_unused_subscriptions"
                title TEXT NOT NULL,
                category TEXT NOT NULL,                     -- subscription_cancel, spending_cut, savings_boost, debt_reduction
                spend_category TEXT,                        -- transaction category a spending cut targets
                difficulty TEXT NOT NULL,                   -- quick_win, moderate, involved
                est_minutes INTEGER NOT NULL,
                min_savings TEXT NOT NULL,                  -- expected monthly savings range
                max_savings TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );

            -- Goals the user declared
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                kind TEXT NOT NULL,                         -- goal kind slug, e.g. "emergency_fund"
                name TEXT NOT NULL,
                target_amount TEXT,
                status TEXT NOT NULL DEFAULT 'active',      -- active, achieved, abandoned
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_goals_user_status ON goals(user_id, status);

            -- Which action categories advance which goal kinds
            CREATE TABLE IF NOT EXISTS goal_category_map (
                id INTEGER PRIMARY KEY,
                goal_kind TEXT NOT NULL,
                action_category TEXT NOT NULL,
                UNIQUE(goal_kind, action_category)
            );

            -- Action runs (user attempts at catalog actions)
            CREATE TABLE IF NOT EXISTS action_runs (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                candidate_id INTEGER NOT NULL REFERENCES action_candidates(id),
                status TEXT NOT NULL DEFAULT 'in_progress', -- in_progress, paused, completed, abandoned
                started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                completed_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_runs_user_candidate ON action_runs(user_id, candidate_id);

            -- Recommendations (one batch per user; replaced atomically)
            CREATE TABLE IF NOT EXISTS recommendations (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                candidate_id INTEGER NOT NULL REFERENCES action_candidates(id),
                rank INTEGER NOT NULL,                      -- 1..=3, contiguous within a batch
                score REAL NOT NULL,
                confidence TEXT NOT NULL,                   -- medium, high (never low)
                template_key TEXT NOT NULL,
                template_inputs_json TEXT NOT NULL,         -- JSON: typed inputs behind the explanation
                explanation TEXT NOT NULL,
                quick_win INTEGER NOT NULL DEFAULT 0,
                batch_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_recommendations_user ON recommendations(user_id, rank);

            -- Audit events (engine runs, imports, user actions)
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL DEFAULT 1,
                event_type TEXT NOT NULL,                   -- detect_run, forecast_run, recommend_run, import, ...
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT,                               -- JSON payload
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_audit_user_created ON audit_events(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_type ON audit_events(event_type);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

/// Audit trail entry as read back from the database
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: String,
    pub event_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests;

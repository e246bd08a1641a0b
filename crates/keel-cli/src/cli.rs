//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keel - Personal finance coaching pipeline
#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Recurring charge detection, cash-flow forecasting, and next-step coaching", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "keel.db", global = true)]
    pub db: PathBuf,

    /// User ID to operate on
    #[arg(long, default_value = "1", global = true)]
    pub user: i64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set KEEL_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed the action catalog
    Init,

    /// Show database status (encryption, data counts, recent activity)
    Status,

    /// Import transactions from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Attach imported transactions to this account ID
        #[arg(short, long)]
        account: Option<i64>,
    },

    /// Manage accounts (list, add, set-balance)
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Declare and list bills the detector cannot see
    Bills {
        #[command(subcommand)]
        action: BillsAction,
    },

    /// Manage recurring patterns (list, status, essential)
    Patterns {
        #[command(subcommand)]
        action: Option<PatternsAction>,
    },

    /// Detect recurring charges from transaction history
    Detect,

    /// Compute a cash-flow forecast for the next 30 days
    Forecast {
        /// Show the last N snapshots instead of computing a new one
        #[arg(long)]
        history: Option<i64>,
    },

    /// Rank the action catalog into a fresh recommendation batch
    Recommend,

    /// Manage goals (list, add, achieve)
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Inspect or seed the action catalog
    Catalog {
        #[command(subcommand)]
        action: Option<CatalogAction>,
    },

    /// Track attempts at catalog actions (start, complete, abandon)
    Runs {
        #[command(subcommand)]
        action: Option<RunsAction>,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts with balances
    List,

    /// Add an account (re-adding an existing name updates its kind)
    Add {
        /// Account name (e.g. "Everyday Checking")
        name: String,

        /// Account kind: checking, savings, credit
        #[arg(long, default_value = "checking")]
        kind: String,
    },

    /// Set an account's balances
    SetBalance {
        /// Account ID
        id: i64,

        /// Current balance (e.g. "1250.00")
        current: String,

        /// Available balance net of holds
        #[arg(long)]
        available: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BillsAction {
    /// Declare a bill (e.g. annual insurance paid from another account)
    Add {
        /// Bill name (e.g. "Car insurance")
        name: String,

        /// Amount per occurrence (e.g. "89.50")
        #[arg(long)]
        amount: String,

        /// Frequency: weekly, biweekly, monthly, quarterly, annual
        #[arg(long)]
        frequency: String,

        /// Next due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,

        /// Transaction category this bill belongs to
        #[arg(long)]
        category: Option<String>,

        /// Mark as essential (never suggested for cancellation)
        #[arg(long)]
        essential: bool,
    },

    /// List manually declared bills
    List,
}

#[derive(Subcommand)]
pub enum PatternsAction {
    /// List recurring patterns
    List,

    /// Set a pattern's status
    Status {
        /// Pattern ID
        id: i64,

        /// New status: active, paused, ended
        status: String,
    },

    /// Mark a pattern as essential (or clear the flag with --off)
    Essential {
        /// Pattern ID
        id: i64,

        /// Clear the essential flag instead of setting it
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum GoalsAction {
    /// List goals
    List,

    /// Add a goal
    Add {
        /// Goal kind: emergency_fund, debt_free, save_for_purchase, reduce_spending
        kind: String,

        /// Display name (e.g. "3-month emergency fund")
        name: String,

        /// Target amount (e.g. "5000")
        #[arg(long)]
        target: Option<String>,
    },

    /// Mark a goal as achieved
    Achieve {
        /// Goal ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List action candidates
    List,

    /// Seed the default action catalog (no-op if already seeded)
    Seed,
}

#[derive(Subcommand)]
pub enum RunsAction {
    /// List action runs
    List,

    /// Start working on a catalog action
    Start {
        /// Candidate key (e.g. "trim_dining_out") or numeric ID
        candidate: String,
    },

    /// Mark a run as completed
    Complete {
        /// Run ID
        id: i64,
    },

    /// Pause a run (it still blocks re-recommendation)
    Pause {
        /// Run ID
        id: i64,
    },

    /// Abandon a run (its action becomes recommendable again)
    Abandon {
        /// Run ID
        id: i64,
    },
}

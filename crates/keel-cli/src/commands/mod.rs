//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `accounts` - Account commands (list, add, set-balance)
//! - `catalog` - Goal, catalog, and action run commands
//! - `core` - Core commands (init, detect) and shared utilities (open_db)
//! - `forecast` - Cash-flow forecast command
//! - `import` - CSV import command
//! - `patterns` - Bill and recurring pattern commands
//! - `recommend` - Recommendation ranking command
//! - `status` - Database status command

pub mod accounts;
pub mod catalog;
pub mod core;
pub mod forecast;
pub mod import;
pub mod patterns;
pub mod recommend;
pub mod status;

// Re-export command functions for main.rs
pub use accounts::*;
pub use catalog::*;
pub use core::*;
pub use forecast::*;
pub use import::*;
pub use patterns::*;
pub use recommend::*;
pub use status::*;

use rust_decimal::Decimal;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}

/// Format an amount as dollars, keeping the sign in front of the $
pub fn fmt_money(amount: Decimal) -> String {
    if amount.is_sign_negative() {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

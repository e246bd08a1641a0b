//! Account command implementations

use anyhow::{Context, Result};
use keel_core::db::Database;
use keel_core::models::AccountKind;
use rust_decimal::Decimal;

use super::{fmt_money, truncate};

pub fn cmd_accounts_list(db: &Database, user_id: i64) -> Result<()> {
    let accounts = db.list_accounts(user_id)?;

    if accounts.is_empty() {
        println!("No accounts yet. Add one with:");
        println!("  keel accounts add \"Everyday Checking\" --kind checking");
        return Ok(());
    }

    println!();
    println!("📁 Accounts");
    println!("   ─────────────────────────────────────────────────────────────");

    for account in accounts {
        let available = account
            .available_balance
            .map(|b| format!(" (available {})", fmt_money(b)))
            .unwrap_or_default();

        println!(
            "   [{}] {:24} {:8} {:>12}{}",
            account.id,
            truncate(&account.name, 24),
            account.kind.as_str(),
            fmt_money(account.current_balance),
            available
        );
    }

    Ok(())
}

pub fn cmd_accounts_add(db: &Database, user_id: i64, name: &str, kind: &str) -> Result<()> {
    let kind: AccountKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let id = db.upsert_account(user_id, name, kind)?;

    println!("✅ Account ready (ID: {})", id);
    println!("   Set balances with: keel accounts set-balance {} 1250.00", id);

    Ok(())
}

pub fn cmd_accounts_set_balance(
    db: &Database,
    account_id: i64,
    current: &str,
    available: Option<&str>,
) -> Result<()> {
    let current: Decimal = current
        .parse()
        .context("Invalid balance (use a decimal like 1250.00)")?;
    let available = available
        .map(|s| s.parse::<Decimal>())
        .transpose()
        .context("Invalid --available (use a decimal like 1100.00)")?;

    let account = db
        .get_account(account_id)?
        .ok_or_else(|| anyhow::anyhow!("No account with ID {}", account_id))?;

    db.set_account_balances(account_id, current, available)?;

    println!("✅ Balances updated: {} (ID: {})", account.name, account_id);
    println!("   Current: {}", fmt_money(current));
    if let Some(avail) = available {
        println!("   Available: {}", fmt_money(avail));
    }

    Ok(())
}

//! Bill and recurring pattern command implementations

use anyhow::{Context, Result};
use chrono::NaiveDate;
use keel_core::db::Database;
use keel_core::detect::add_manual_bill;
use keel_core::models::{Frequency, PatternOrigin, PatternStatus};
use rust_decimal::Decimal;

use super::{fmt_money, truncate};

#[allow(clippy::too_many_arguments)]
pub fn cmd_bills_add(
    db: &Database,
    user_id: i64,
    name: &str,
    amount: &str,
    frequency: &str,
    due: &str,
    category: Option<&str>,
    essential: bool,
) -> Result<()> {
    let amount: Decimal = amount
        .parse()
        .context("Invalid --amount (use a decimal like 89.50)")?;
    let frequency: Frequency = frequency.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let due = NaiveDate::parse_from_str(due, "%Y-%m-%d")
        .context("Invalid --due date format (use YYYY-MM-DD)")?;

    let pattern = add_manual_bill(db, user_id, name, amount, frequency, due, category, essential)?;

    println!("✅ Bill declared (ID: {})", pattern.id);
    println!(
        "   {} {}/{} next due {}",
        pattern.name,
        fmt_money(pattern.estimated_amount),
        pattern.frequency.as_str(),
        pattern.next_expected_date
    );
    if pattern.essential {
        println!("   Marked essential: never suggested for cancellation");
    }

    Ok(())
}

pub fn cmd_bills_list(db: &Database, user_id: i64) -> Result<()> {
    let patterns = db.list_patterns(user_id)?;
    let bills: Vec<_> = patterns
        .iter()
        .filter(|p| p.origin == PatternOrigin::Manual)
        .collect();

    if bills.is_empty() {
        println!("No declared bills. Add one with:");
        println!("  keel bills add \"Car insurance\" --amount 89.50 --frequency monthly --due 2025-07-01");
        return Ok(());
    }

    println!();
    println!("🧾 Declared Bills");
    println!("   ─────────────────────────────────────────────────────────────");

    for bill in bills {
        let essential_mark = if bill.essential { " (essential)" } else { "" };

        println!(
            "   [{}] {:24} {:>10}/{:<9} next {}{}",
            bill.id,
            truncate(&bill.name, 24),
            fmt_money(bill.estimated_amount),
            bill.frequency.as_str(),
            bill.next_expected_date,
            essential_mark
        );
    }

    Ok(())
}

pub fn cmd_patterns_list(db: &Database, user_id: i64) -> Result<()> {
    let patterns = db.list_patterns(user_id)?;

    if patterns.is_empty() {
        println!("No recurring patterns yet. Run:");
        println!("  keel detect");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Patterns");
    println!("   ─────────────────────────────────────────────────────────────");

    for pattern in patterns {
        let status_icon = match pattern.status {
            PatternStatus::Active => "✅",
            PatternStatus::Paused => "⏸️",
            PatternStatus::Ended => "❌",
        };
        let origin_mark = match pattern.origin {
            PatternOrigin::Manual => " [bill]",
            PatternOrigin::Detected => "",
        };
        let essential_mark = if pattern.essential { " (essential)" } else { "" };

        println!(
            "   {} [{}] {:22} {:>10}/{:<9} {:6} next {}{}{}",
            status_icon,
            pattern.id,
            truncate(&pattern.name, 22),
            fmt_money(pattern.estimated_amount),
            pattern.frequency.as_str(),
            pattern.confidence.as_str(),
            pattern.next_expected_date,
            origin_mark,
            essential_mark
        );
    }

    Ok(())
}

pub fn cmd_patterns_status(db: &Database, pattern_id: i64, status: &str) -> Result<()> {
    let status: PatternStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let pattern = db
        .get_pattern(pattern_id)?
        .ok_or_else(|| anyhow::anyhow!("No pattern with ID {}", pattern_id))?;

    db.set_pattern_status(pattern_id, status)?;

    println!("✅ {} set to {}", pattern.name, status.as_str());
    if status != PatternStatus::Active {
        println!("   It no longer feeds the forecast or the ranker");
    }

    Ok(())
}

pub fn cmd_patterns_essential(db: &Database, pattern_id: i64, essential: bool) -> Result<()> {
    let pattern = db
        .get_pattern(pattern_id)?
        .ok_or_else(|| anyhow::anyhow!("No pattern with ID {}", pattern_id))?;

    db.set_pattern_essential(pattern_id, essential)?;

    if essential {
        println!("✅ {} marked essential", pattern.name);
        println!("   It will never be counted as a cancellable subscription");
    } else {
        println!("✅ {} essential flag cleared", pattern.name);
    }

    Ok(())
}

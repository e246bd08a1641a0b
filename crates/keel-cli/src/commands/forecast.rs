//! Cash-flow forecast command implementation

use std::path::Path;

use anyhow::Result;
use keel_core::forecast::ForecastEngine;
use keel_core::models::ForecastSnapshot;

use super::{fmt_money, open_db};

pub fn cmd_forecast(
    db_path: &Path,
    user_id: i64,
    history: Option<i64>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    if let Some(limit) = history {
        let snapshots = db.forecast_history(user_id, limit)?;

        if snapshots.is_empty() {
            println!("No forecast snapshots yet. Compute one with:");
            println!("  keel forecast");
            return Ok(());
        }

        println!();
        println!("📈 Forecast History");
        println!("   ─────────────────────────────────────────────────────────────");

        for snapshot in snapshots {
            println!(
                "   [{}] {}  balance {:>12}  safe today {:>12}  urgency {:>3}",
                snapshot.id,
                snapshot.computed_at.format("%Y-%m-%d %H:%M"),
                fmt_money(snapshot.current_balance),
                fmt_money(snapshot.safe_to_spend_today),
                snapshot.urgency_score
            );
        }

        return Ok(());
    }

    println!("📈 Computing 30-day cash-flow forecast...");

    let engine = ForecastEngine::new(&db);
    let snapshot = engine.run(user_id)?;

    print_snapshot(&snapshot);

    Ok(())
}

fn print_snapshot(snapshot: &ForecastSnapshot) {
    println!();
    println!("📊 Forecast");
    println!("   ─────────────────────────────");
    println!(
        "   Current balance: {}",
        fmt_money(snapshot.current_balance)
    );
    println!(
        "   Safe to spend today: {}",
        fmt_money(snapshot.safe_to_spend_today)
    );
    println!(
        "   Safe to spend this week: {}",
        fmt_money(snapshot.safe_to_spend_week)
    );
    if let Some(end) = snapshot.end_of_horizon() {
        println!(
            "   In 30 days: {} (between {} and {})",
            fmt_money(end.expected),
            fmt_money(end.lower),
            fmt_money(end.upper)
        );
    }
    println!("   Confidence: {}", snapshot.confidence.as_str());

    println!();
    if snapshot.urgency_factors.is_empty() {
        println!("   Urgency: {}/100 (no pressure right now)", snapshot.urgency_score);
    } else {
        println!("   Urgency: {}/100", snapshot.urgency_score);
        for factor in &snapshot.urgency_factors {
            println!("   ⚠️  {}", factor);
        }
    }

    println!();
    println!("   Assumptions:");
    for assumption in &snapshot.assumptions {
        println!("   - {}", assumption);
    }
}

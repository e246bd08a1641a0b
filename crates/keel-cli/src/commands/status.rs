//! Database status command implementation

use std::path::Path;

use anyhow::Result;
use keel_core::db::Database;
use keel_core::models::PatternStatus;

use super::{fmt_money, open_db};

pub fn cmd_status(db_path: &Path, user_id: i64, no_encrypt: bool) -> Result<()> {
    use keel_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Keel Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Err(e) = print_data_summary(&db, user_id) {
                    println!();
                    println!("   ❌ Error reading database: {}", e);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}

fn print_data_summary(db: &Database, user_id: i64) -> Result<()> {
    let accounts = db.list_accounts(user_id)?;
    let patterns = db.list_patterns(user_id)?;
    let active = patterns
        .iter()
        .filter(|p| p.status == PatternStatus::Active)
        .count();

    println!();
    println!("   Accounts: {}", accounts.len());
    println!("   Transactions: {}", db.count_transactions(user_id)?);
    println!(
        "   Recurring patterns: {} ({} active)",
        patterns.len(),
        active
    );
    println!("   Goals: {}", db.list_goals(user_id)?.len());

    if let Some(snapshot) = db.latest_forecast(user_id)? {
        println!();
        println!(
            "   Latest forecast: {} (urgency {}/100)",
            snapshot.computed_at.format("%Y-%m-%d %H:%M"),
            snapshot.urgency_score
        );
        println!(
            "   Safe to spend today: {}",
            fmt_money(snapshot.safe_to_spend_today)
        );
    }

    let events = db.recent_events(user_id, 5)?;
    if !events.is_empty() {
        println!();
        println!("   Recent activity:");
        for event in events {
            println!("   - {} {}", event.timestamp, event.event_type);
        }
    }

    Ok(())
}

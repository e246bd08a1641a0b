//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database and seed the action catalog
//! - `cmd_detect` - Detect recurring charges from transaction history

use std::path::Path;

use anyhow::{Context, Result};
use keel_core::db::Database;
use keel_core::detect::PatternDetector;
use keel_core::models::{Confidence, PatternOrigin};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    let seeded = db
        .seed_default_catalog()
        .context("Failed to seed action catalog")?;
    if seeded > 0 {
        println!("   Seeded {} catalog actions", seeded);
    } else {
        println!("   Action catalog already seeded");
    }

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: keel import --file statement.csv");
    println!("  2. Detect recurring charges: keel detect");
    println!("  3. Get a forecast: keel forecast");

    Ok(())
}

pub fn cmd_detect(db_path: &Path, user_id: i64, no_encrypt: bool) -> Result<()> {
    println!("🔍 Detecting recurring charges...");

    let db = open_db(db_path, no_encrypt)?;
    let detector = PatternDetector::new(&db);
    let patterns = detector.detect(user_id)?;

    let detected: Vec<_> = patterns
        .iter()
        .filter(|p| p.origin == PatternOrigin::Detected)
        .collect();
    let manual = patterns.len() - detected.len();

    let high = detected
        .iter()
        .filter(|p| p.confidence == Confidence::High)
        .count();
    let medium = detected
        .iter()
        .filter(|p| p.confidence == Confidence::Medium)
        .count();
    let low = detected.len() - high - medium;

    println!();
    println!("📊 Detection Results");
    println!("   ─────────────────────────────");
    println!("   Recurring charges found: {}", detected.len());
    println!("   High confidence: {}", high);
    println!("   Medium confidence: {}", medium);
    println!("   Low confidence: {}", low);
    if manual > 0 {
        println!("   Declared bills kept: {}", manual);
    }

    println!();
    if detected.is_empty() {
        println!("💡 Tip: The detector needs at least two charges from the same");
        println!("   counterparty. Import more history: keel import --file statement.csv");
    } else {
        println!("Review them with: keel patterns list");
    }

    Ok(())
}

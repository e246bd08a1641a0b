//! CSV import command implementation

use std::path::Path;

use anyhow::Result;
use keel_core::import::import_csv;

use super::open_db;

pub fn cmd_import(
    db_path: &Path,
    user_id: i64,
    file: &Path,
    account_id: Option<i64>,
    no_encrypt: bool,
) -> Result<()> {
    println!("📥 Importing transactions from {}...", file.display());

    let db = open_db(db_path, no_encrypt)?;
    let summary = import_csv(&db, user_id, account_id, file)?;

    println!("✅ Import complete!");
    println!("   Rows read: {}", summary.rows_read);
    println!("   Imported: {}", summary.imported);
    println!("   Skipped (duplicates): {}", summary.duplicates);
    if summary.skipped > 0 {
        println!("   ⚠️  Malformed rows skipped: {}", summary.skipped);
    }

    if summary.imported > 0 {
        println!();
        println!("Next: keel detect");
    }

    Ok(())
}

//! CSV transaction import
//!
//! One documented layout:
//! `date,description,counterparty,category,amount,direction,pending`
//! (header required). Amounts are positive; `direction` carries the
//! sign. Malformed rows are skipped with a warning, never fatal, and
//! rows the user already imported are deduplicated by hash.

use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Direction, NewTransaction};

/// What an import run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Import transactions from a CSV file
pub fn import_csv(
    db: &Database,
    user_id: i64,
    account_id: Option<i64>,
    path: &Path,
) -> Result<ImportSummary> {
    let file = std::fs::File::open(path)?;
    import_reader(db, user_id, account_id, file)
}

/// Import transactions from any CSV source
pub fn import_reader<R: Read>(
    db: &Database,
    user_id: i64,
    account_id: Option<i64>,
    reader: R,
) -> Result<ImportSummary> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows_read = 0usize;
    let mut skipped = 0usize;
    let mut parsed = Vec::new();

    for result in rdr.records() {
        rows_read += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping row {}: {}", rows_read, e);
                skipped += 1;
                continue;
            }
        };

        match parse_row(user_id, &record) {
            Ok(tx) => parsed.push(tx),
            Err(e) => {
                warn!("Skipping row {}: {}", rows_read, e);
                skipped += 1;
            }
        }
    }

    let outcome = db.insert_transactions(user_id, account_id, &parsed)?;
    let summary = ImportSummary {
        rows_read,
        imported: outcome.inserted,
        duplicates: outcome.duplicates,
        skipped,
    };

    info!(
        "Imported {} of {} row(s) ({} duplicate(s), {} skipped)",
        summary.imported, summary.rows_read, summary.duplicates, summary.skipped
    );

    let details = serde_json::json!({
        "rows_read": summary.rows_read,
        "imported": summary.imported,
        "duplicates": summary.duplicates,
        "skipped": summary.skipped,
    });
    if let Err(e) = db.record_event(
        user_id,
        "transactions_imported",
        Some("transaction"),
        None,
        Some(&details.to_string()),
    ) {
        warn!("Failed to record import audit event: {}", e);
    }

    Ok(summary)
}

/// Parse one row of the documented layout
///
/// Columns: date, description, counterparty, category, amount,
/// direction, pending. Counterparty and category may be empty.
fn parse_row(user_id: i64, record: &StringRecord) -> Result<NewTransaction> {
    let date_str = record
        .get(0)
        .ok_or_else(|| Error::Import("Missing date".into()))?;
    let date = parse_date(date_str)?;

    let description = record
        .get(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Import("Missing description".into()))?
        .to_string();

    let counterparty = record
        .get(2)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    // Stored folded so downstream category matching stays exact
    let category = record
        .get(3)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase());

    let amount_str = record
        .get(4)
        .ok_or_else(|| Error::Import("Missing amount".into()))?;
    let amount = parse_amount(amount_str)?;

    let direction: Direction = record
        .get(5)
        .ok_or_else(|| Error::Import("Missing direction".into()))?
        .trim()
        .parse()
        .map_err(Error::Import)?;

    let pending = matches!(
        record.get(6).map(|s| s.trim().to_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    );

    let import_hash = generate_hash(user_id, &date, &description, amount, direction);

    Ok(NewTransaction {
        posted_at: date.and_time(NaiveTime::MIN).and_utc(),
        description,
        counterparty,
        category,
        amount,
        direction,
        pending,
        import_hash: Some(import_hash),
    })
}

/// Parse a date, ISO first, US format as a fallback
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse a positive amount, tolerating currency symbols and commas
fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned = s.trim().replace(['$', ','], "");
    let amount: Decimal = cleaned
        .parse()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))?;
    if amount <= Decimal::ZERO {
        return Err(Error::Import(format!(
            "Amount must be positive (direction carries the sign), got {}",
            s
        )));
    }
    Ok(amount)
}

/// Dedup hash over the fields that identify a row to its owner
fn generate_hash(
    user_id: i64,
    date: &NaiveDate,
    description: &str,
    amount: Decimal,
    direction: Direction,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_string().as_bytes());
    hasher.update(direction.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

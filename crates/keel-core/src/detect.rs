//! Recurring charge detection
//!
//! Scans a user's settled debit history for charges that repeat at a
//! steady cadence (subscriptions, bills, memberships) and rewrites the
//! detected pattern set. Manually declared bills live in the same table
//! but are never touched by a detection run.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Confidence, Frequency, NewPattern, PatternOrigin, RecurringPattern, Transaction,
};

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// How many months of history to scan
    pub lookback_months: i64,
    /// Minimum charges from one counterparty before a cadence is considered
    pub min_occurrences: usize,
    /// Gap spread allowed around the mean for intervals to count as consistent (days)
    pub interval_tolerance_days: f64,
    /// Amount spread allowed around the mean for amounts to count as consistent (fraction)
    pub amount_tolerance: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            lookback_months: 24,
            min_occurrences: 2,
            interval_tolerance_days: 3.0,
            amount_tolerance: 0.10, // within 10% of the mean
        }
    }
}

/// Recurring charge detector
///
/// Each run is a full recompute: the previously detected set is
/// replaced wholesale, never merged.
pub struct PatternDetector<'a> {
    db: &'a Database,
    config: DetectionConfig,
}

impl<'a> PatternDetector<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: DetectionConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: DetectionConfig) -> Self {
        Self { db, config }
    }

    /// Detect recurring charges and rewrite the detected pattern set
    ///
    /// Groups settled debits by counterparty, tests each group for a
    /// stable cadence, and atomically swaps the new set in. Returns the
    /// full pattern list as persisted, manual bills included.
    pub fn detect(&self, user_id: i64) -> Result<Vec<RecurringPattern>> {
        let since = Utc::now() - Duration::days(self.config.lookback_months * 30);
        let transactions = self.db.debit_transactions_with_counterparty(user_id, since)?;

        let mut by_counterparty: HashMap<&str, Vec<&Transaction>> = HashMap::new();
        for tx in &transactions {
            if let Some(cp) = &tx.counterparty {
                by_counterparty.entry(cp.as_str()).or_default().push(tx);
            }
        }

        let mut detected = Vec::new();
        let mut discarded = 0usize;

        for (counterparty, txs) in &by_counterparty {
            if txs.len() < self.config.min_occurrences {
                continue; // a lone charge can't establish a cadence
            }

            match analyze_group(counterparty, txs, &self.config) {
                Some(pattern) => {
                    debug!(
                        "Found {} pattern: {} @ ${} ({} charges, {:?})",
                        pattern.frequency,
                        counterparty,
                        pattern.estimated_amount,
                        pattern.occurrence_count,
                        pattern.confidence
                    );
                    detected.push(pattern);
                }
                None => discarded += 1,
            }
        }

        let replaced = self.db.replace_detected_patterns(user_id, &detected)?;

        info!(
            "Detection complete: {} patterns from {} counterparties ({} groups discarded)",
            replaced,
            by_counterparty.len(),
            discarded
        );

        let details = serde_json::json!({
            "detected": replaced,
            "counterparties": by_counterparty.len(),
            "discarded": discarded,
        });
        if let Err(e) = self.db.record_event(
            user_id,
            "patterns_detected",
            Some("recurring_pattern"),
            None,
            Some(&details.to_string()),
        ) {
            warn!("Failed to record detection audit event: {}", e);
        }

        self.db.list_patterns(user_id)
    }
}

/// Declare a bill the detector can't see (rent paid by check, a new lease)
///
/// Manual bills land in the same table detection writes to, but with
/// `origin = manual` and confidence pinned to high, so detection runs
/// never rewrite them.
#[allow(clippy::too_many_arguments)]
pub fn add_manual_bill(
    db: &Database,
    user_id: i64,
    name: &str,
    amount: Decimal,
    frequency: Frequency,
    next_due: NaiveDate,
    category: Option<&str>,
    essential: bool,
) -> Result<RecurringPattern> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Bill name cannot be empty".to_string()));
    }
    if amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "Bill amount must be positive, got {}",
            amount
        )));
    }

    let pattern = NewPattern {
        counterparty: None,
        name: name.to_string(),
        category: category.map(|c| c.to_string()),
        frequency,
        estimated_amount: amount.round_dp(2),
        amount_variance: Decimal::ZERO,
        next_expected_date: next_due,
        // Backdate one nominal interval so the date invariant holds
        last_observed_date: next_due - Duration::days(frequency.interval_days()),
        occurrence_count: 0,
        confidence: Confidence::High,
        origin: PatternOrigin::Manual,
        essential,
    };

    let id = db.insert_manual_pattern(user_id, &pattern)?;
    info!("Added manual bill: {} (${}/{})", name, pattern.estimated_amount, frequency);

    if let Err(e) = db.record_event(
        user_id,
        "manual_bill_added",
        Some("recurring_pattern"),
        Some(id),
        None,
    ) {
        warn!("Failed to record manual bill audit event: {}", e);
    }

    db.get_pattern(id)?
        .ok_or_else(|| Error::NotFound(format!("Pattern {} missing after insert", id)))
}

/// Test one counterparty's charges for a stable cadence
///
/// Returns None when the group is too small, the gaps don't map onto a
/// known cadence, or the stored amounts can't be averaged.
fn analyze_group(
    counterparty: &str,
    transactions: &[&Transaction],
    config: &DetectionConfig,
) -> Option<NewPattern> {
    if transactions.len() < config.min_occurrences {
        return None;
    }

    let mut sorted: Vec<_> = transactions.to_vec();
    sorted.sort_by_key(|t| (t.posted_at, t.id));

    let dates: Vec<NaiveDate> = sorted.iter().map(|t| t.posted_at.date_naive()).collect();
    let gaps: Vec<f64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days() as f64)
        .collect();

    if gaps.iter().all(|&g| g == 0.0) {
        warn!(
            "Skipping {}: all {} charges share one posted date",
            counterparty,
            sorted.len()
        );
        return None;
    }

    let mean_gap = mean(&gaps);
    let frequency = classify_frequency(mean_gap)?;

    let intervals_consistent = gaps
        .iter()
        .all(|g| (g - mean_gap).abs() <= config.interval_tolerance_days);

    let Some(amount_values) = sorted
        .iter()
        .map(|t| t.amount.to_f64())
        .collect::<Option<Vec<f64>>>()
    else {
        warn!("Skipping {}: stored amounts do not convert for statistics", counterparty);
        return None;
    };

    let mean_amount_f = mean(&amount_values);
    if mean_amount_f <= 0.0 {
        warn!("Skipping {}: non-positive mean charge amount", counterparty);
        return None;
    }

    let amounts_consistent = amount_values
        .iter()
        .all(|a| (a - mean_amount_f).abs() <= mean_amount_f * config.amount_tolerance);

    // Exact decimal mean for the stored estimate; stddev stays in f64
    let total: Decimal = sorted.iter().map(|t| t.amount).sum();
    let estimated_amount = (total / Decimal::from(sorted.len() as u64)).round_dp(2);

    let Some(amount_variance) = Decimal::from_f64(sample_stddev(&amount_values)) else {
        warn!("Skipping {}: amount spread does not convert for statistics", counterparty);
        return None;
    };

    let last_observed_date = *dates.last()?;
    let category = sorted.last()?.category.clone();

    Some(NewPattern {
        counterparty: Some(counterparty.to_string()),
        name: counterparty.to_string(),
        category,
        frequency,
        estimated_amount,
        amount_variance: amount_variance.round_dp(2),
        next_expected_date: last_observed_date + Duration::days(mean_gap.round() as i64),
        last_observed_date,
        occurrence_count: sorted.len() as i64,
        confidence: grade_confidence(sorted.len(), intervals_consistent, amounts_consistent),
        origin: PatternOrigin::Detected,
        essential: false,
    })
}

/// Map a mean day gap onto a recurrence cadence
///
/// Gaps that land between windows (every ~20 days, every ~50 days)
/// don't bill on any calendar anyone uses, so the group is discarded.
fn classify_frequency(mean_gap_days: f64) -> Option<Frequency> {
    match mean_gap_days {
        g if (5.0..=9.0).contains(&g) => Some(Frequency::Weekly),
        g if (12.0..=16.0).contains(&g) => Some(Frequency::Biweekly),
        g if (27.0..=34.0).contains(&g) => Some(Frequency::Monthly),
        g if (85.0..=100.0).contains(&g) => Some(Frequency::Quarterly),
        g if (350.0..=380.0).contains(&g) => Some(Frequency::Annual),
        _ => None,
    }
}

/// Grade how much to trust a detected cadence
///
/// Two charges can only ever reach medium; high needs three or more
/// with both steady gaps and steady amounts.
fn grade_confidence(
    occurrences: usize,
    intervals_consistent: bool,
    amounts_consistent: bool,
) -> Confidence {
    match (occurrences, intervals_consistent, amounts_consistent) {
        (n, true, true) if n >= 3 => Confidence::High,
        (n, true, _) if n >= 3 => Confidence::Medium,
        (2, true, _) => Confidence::Medium,
        _ => Confidence::Low,
    }
}

/// Mean of a sample
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero with fewer than two points
pub(crate) fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

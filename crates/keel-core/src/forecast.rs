//! Cash-flow forecasting
//!
//! Projects depository balances 30 days forward from settled history
//! plus active recurring patterns, grades how safe spending is today
//! and this week, and scores how urgently the user needs to act.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::db::Database;
use crate::detect::sample_stddev;
use crate::error::{Error, Result};
use crate::models::{
    Confidence, ConfidenceInputs, Direction, ForecastSnapshot, ProjectionPoint, RecurringPattern,
};

/// How far back the spending statistics look
const HISTORY_WINDOW_DAYS: i64 = 90;
/// How far forward the projection runs
const PROJECTION_DAYS: i64 = 30;

/// A computed forecast, ready to persist
///
/// The snapshot table assigns the id and created_at; everything else
/// is produced here.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub user_id: i64,
    pub computed_at: DateTime<Utc>,
    pub current_balance: Decimal,
    pub safe_to_spend_today: Decimal,
    pub safe_to_spend_week: Decimal,
    pub projection: Vec<ProjectionPoint>,
    pub confidence: Confidence,
    pub confidence_inputs: ConfidenceInputs,
    pub urgency_score: i64,
    pub urgency_factors: Vec<String>,
    pub assumptions: Vec<String>,
}

/// Cash-flow forecast engine
pub struct ForecastEngine<'a> {
    db: &'a Database,
}

impl<'a> ForecastEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Compute and persist a forecast snapshot
    ///
    /// Snapshots are append-only; each run adds a row and returns it.
    /// Thin history is never an error, it just grades the confidence
    /// down and widens nothing (a zero-spend user projects flat).
    pub fn run(&self, user_id: i64) -> Result<ForecastSnapshot> {
        let today = Utc::now().date_naive();

        let accounts = self.db.list_accounts(user_id)?;
        let depository: Vec<_> = accounts
            .iter()
            .filter(|a| a.kind.is_depository())
            .collect();
        let current_balance: Decimal = depository.iter().map(|a| a.spendable_balance()).sum();

        let patterns = self.db.active_patterns(user_id)?;
        let pattern_counterparties: HashSet<&str> = patterns
            .iter()
            .filter_map(|p| p.counterparty.as_deref())
            .collect();

        // Settled activity over the trailing 90 calendar days, today included
        let window_start = today - Duration::days(HISTORY_WINDOW_DAYS - 1);
        let since = window_start.and_time(NaiveTime::MIN).and_utc();
        let window: Vec<_> = self
            .db
            .transactions_since(user_id, since)?
            .into_iter()
            .filter(|t| !t.pending)
            .collect();

        let mut total_credits = Decimal::ZERO;
        let mut total_debits = Decimal::ZERO;
        let mut pattern_attributable = Decimal::ZERO;
        let mut daily_debits: HashMap<NaiveDate, Decimal> = HashMap::new();

        for tx in &window {
            if tx.direction == Direction::Credit {
                total_credits += tx.amount;
            } else {
                total_debits += tx.amount;
                *daily_debits.entry(tx.posted_at.date_naive()).or_default() += tx.amount;
                if tx
                    .counterparty
                    .as_deref()
                    .is_some_and(|cp| pattern_counterparties.contains(cp))
                {
                    // Spend already claimed by a pattern must not also
                    // count as discretionary.
                    pattern_attributable += tx.amount;
                }
            }
        }

        let window_f = HISTORY_WINDOW_DAYS as f64;
        let avg_daily_income = total_credits.to_f64().unwrap_or(0.0) / window_f;
        let avg_daily_spend = total_debits.to_f64().unwrap_or(0.0) / window_f;
        let avg_daily_discretionary = ((total_debits - pattern_attributable)
            .to_f64()
            .unwrap_or(0.0)
            / window_f)
            .max(0.0);

        // Zero-filled daily totals so quiet days pull the spread in
        let daily_totals: Vec<f64> = (0..HISTORY_WINDOW_DAYS)
            .map(|offset| {
                daily_debits
                    .get(&(window_start + Duration::days(offset)))
                    .and_then(|d| d.to_f64())
                    .unwrap_or(0.0)
            })
            .collect();
        let daily_spend_stddev = sample_stddev(&daily_totals);

        let (due_today, due_this_week, events) = schedule_obligations(&patterns, today);

        let safe_to_spend_today = current_balance - due_today;
        let safe_to_spend_week = current_balance - due_this_week;

        let daily_income = money(avg_daily_income);
        let daily_discretionary = money(avg_daily_discretionary);

        let mut projection = Vec::with_capacity(PROJECTION_DAYS as usize);
        let mut running = current_balance;
        for offset in 1..=PROJECTION_DAYS {
            let date = today + Duration::days(offset);
            running += daily_income - daily_discretionary;
            if let Some(due) = events.get(&date) {
                running -= *due;
            }
            // Uncertainty compounds with distance
            let spread = money(daily_spend_stddev * (offset as f64).sqrt());
            projection.push(ProjectionPoint {
                date,
                expected: running,
                lower: running - spread,
                upper: running + spread,
            });
        }

        let days_of_history = match self.db.earliest_transaction_date(user_id)? {
            Some(earliest) => (today - earliest.date_naive()).num_days().max(0),
            None => 0,
        };

        let confidence_inputs = ConfidenceInputs {
            days_of_history,
            transaction_count: window.len(),
            active_patterns: patterns.len(),
            high_confidence_patterns: patterns
                .iter()
                .filter(|p| p.confidence == Confidence::High)
                .count(),
            medium_confidence_patterns: patterns
                .iter()
                .filter(|p| p.confidence == Confidence::Medium)
                .count(),
            low_confidence_patterns: patterns
                .iter()
                .filter(|p| p.confidence == Confidence::Low)
                .count(),
            account_count: depository.len(),
        };
        let confidence = grade_confidence(&confidence_inputs);

        let end_balance = projection
            .last()
            .map(|p| p.expected)
            .unwrap_or(current_balance);
        let (urgency_score, urgency_factors) = score_urgency(
            current_balance,
            safe_to_spend_today,
            safe_to_spend_week,
            end_balance,
            avg_daily_spend,
        );

        let monthly_recurring: Decimal = patterns
            .iter()
            .map(|p| monthly_equivalent(p))
            .sum::<Decimal>()
            .round_dp(2);
        let assumptions = vec![
            format!(
                "Current balance ${} comes from {} depository account(s)",
                current_balance,
                depository.len()
            ),
            format!(
                "Average daily spend ${:.2} and income ${:.2} over the last {} days, quiet days counted as zero",
                avg_daily_spend, avg_daily_income, HISTORY_WINDOW_DAYS
            ),
            format!(
                "{} active recurring pattern(s) totaling about ${} per month",
                patterns.len(),
                monthly_recurring
            ),
            "No one-off income or unexpected expenses are modeled".to_string(),
        ];

        let forecast = Forecast {
            user_id,
            computed_at: Utc::now(),
            current_balance,
            safe_to_spend_today,
            safe_to_spend_week,
            projection,
            confidence,
            confidence_inputs,
            urgency_score,
            urgency_factors,
            assumptions,
        };

        let id = self.db.insert_forecast_snapshot(&forecast)?;

        info!(
            "Forecast for user {}: balance ${}, safe today ${}, urgency {} ({:?})",
            user_id, current_balance, safe_to_spend_today, urgency_score, confidence
        );

        let details = serde_json::json!({
            "current_balance": current_balance.to_string(),
            "urgency_score": urgency_score,
            "confidence": confidence.as_str(),
        });
        if let Err(e) = self.db.record_event(
            user_id,
            "forecast_computed",
            Some("forecast_snapshot"),
            Some(id),
            Some(&details.to_string()),
        ) {
            warn!("Failed to record forecast audit event: {}", e);
        }

        self.db
            .get_forecast(id)?
            .ok_or_else(|| Error::NotFound(format!("Forecast snapshot {} missing after insert", id)))
    }
}

/// Expand active patterns into dated obligations
///
/// Returns the amount due today or earlier, the amount due through
/// today+6, and the per-date amounts falling inside the projection
/// horizon. Overdue occurrences stay in the totals; a missed bill is
/// still owed.
fn schedule_obligations(
    patterns: &[RecurringPattern],
    today: NaiveDate,
) -> (Decimal, Decimal, HashMap<NaiveDate, Decimal>) {
    let week_end = today + Duration::days(6);
    let horizon_end = today + Duration::days(PROJECTION_DAYS);

    let mut due_today = Decimal::ZERO;
    let mut due_this_week = Decimal::ZERO;
    let mut events: HashMap<NaiveDate, Decimal> = HashMap::new();

    for pattern in patterns {
        let interval = pattern.frequency.interval_days();
        let mut date = pattern.next_expected_date;
        while date <= horizon_end {
            if date <= today {
                due_today += pattern.estimated_amount;
            }
            if date <= week_end {
                due_this_week += pattern.estimated_amount;
            }
            if date > today {
                *events.entry(date).or_default() += pattern.estimated_amount;
            }
            date += Duration::days(interval);
        }
    }

    (due_today, due_this_week, events)
}

/// Nominal monthly cost of one pattern
pub(crate) fn monthly_equivalent(pattern: &RecurringPattern) -> Decimal {
    (pattern.estimated_amount * Decimal::from(30) / Decimal::from(pattern.frequency.interval_days()))
        .round_dp(2)
}

fn grade_confidence(inputs: &ConfidenceInputs) -> Confidence {
    if inputs.days_of_history >= 90 && inputs.high_confidence_patterns >= 3 {
        Confidence::High
    } else if inputs.days_of_history >= 30 && inputs.active_patterns >= 1 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Additive urgency score, capped at 100
///
/// Each factor that fires contributes a human-readable line so the
/// score is explainable after the fact.
fn score_urgency(
    current_balance: Decimal,
    safe_today: Decimal,
    safe_week: Decimal,
    end_balance: Decimal,
    avg_daily_spend: f64,
) -> (i64, Vec<String>) {
    let mut score = 0i64;
    let mut factors = Vec::new();

    if avg_daily_spend > 0.0 {
        let runway_days = (current_balance.to_f64().unwrap_or(0.0) / avg_daily_spend)
            .floor()
            .max(0.0) as i64;
        if runway_days < 7 {
            score += 40;
            factors.push(format!("Balance covers about {} day(s) of spending", runway_days));
        } else if runway_days < 14 {
            score += 25;
            factors.push(format!("Balance covers about {} days of spending", runway_days));
        } else if runway_days < 30 {
            score += 10;
            factors.push(format!("Balance covers about {} days of spending", runway_days));
        }
    }

    if safe_today < Decimal::ZERO {
        score += 30;
        factors.push(format!("Obligations due now exceed the balance by ${}", -safe_today));
    } else if safe_week < Decimal::ZERO {
        score += 20;
        factors.push(format!("This week's obligations exceed the balance by ${}", -safe_week));
    }

    if end_balance < Decimal::ZERO {
        score += 30;
        factors.push(format!("Projected to end the month overdrawn (${})", end_balance));
    } else if current_balance > Decimal::ZERO && end_balance < current_balance / Decimal::from(2) {
        score += 15;
        factors.push("Projected to lose more than half the current balance this month".to_string());
    }

    (score.min(100), factors)
}

/// Round an f64 statistic into a money amount
fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

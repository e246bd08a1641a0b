//! Domain models for Keel

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::explain::TemplateInputs;

/// A bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: AccountKind,
    /// ISO currency code (engines assume a single currency per user)
    pub currency: String,
    pub current_balance: Decimal,
    /// Balance net of holds, when the institution reports one
    pub available_balance: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The balance forecasting should trust: available when present, else current
    pub fn spendable_balance(&self) -> Decimal {
        self.available_balance.unwrap_or(self.current_balance)
    }
}

/// Account kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
        }
    }

    /// Whether this account counts toward the spendable balance
    pub fn is_depository(&self) -> bool {
        matches!(self, Self::Checking | Self::Savings)
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown account kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether money left or entered the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial transaction
///
/// Transactions are immutable facts: the engines read them but never
/// mutate them. Amounts are absolute magnitudes; `direction` carries
/// the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: Option<i64>,
    pub posted_at: DateTime<Utc>,
    pub description: String,
    /// Resolved merchant/payee identifier; None = unresolved
    pub counterparty: Option<String>,
    pub category: Option<String>,
    pub amount: Decimal,
    pub direction: Direction,
    pub pending: bool,
    /// Hash for import deduplication
    pub import_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new transaction to be inserted (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub posted_at: DateTime<Utc>,
    pub description: String,
    pub counterparty: Option<String>,
    pub category: Option<String>,
    pub amount: Decimal,
    pub direction: Direction,
    pub pending: bool,
    pub import_hash: Option<String>,
}

/// Recurrence cadence of a detected or declared pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }

    /// Nominal interval used when projecting the next occurrence
    pub fn interval_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Biweekly => 14,
            Self::Monthly => 30,
            Self::Quarterly => 91,
            Self::Annual => 365,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annual" | "yearly" => Ok(Self::Annual),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much trust to place in a derived result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a recurring pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    Active,
    Paused,
    Ended,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

impl std::str::FromStr for PatternStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "ended" => Ok(Self::Ended),
            _ => Err(format!("Unknown pattern status: {}", s)),
        }
    }
}

/// Where a pattern came from
///
/// Detection rewrites only `Detected` rows; `Manual` rows belong to
/// the user and survive every detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternOrigin {
    Detected,
    Manual,
}

impl PatternOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for PatternOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detected" => Ok(Self::Detected),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown pattern origin: {}", s)),
        }
    }
}

/// A recurring charge: detected from history or declared by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub id: i64,
    pub user_id: i64,
    /// None only for manually declared bills with no matched merchant
    pub counterparty: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub estimated_amount: Decimal,
    /// Sample stddev of observed amounts; zero when fewer than 2 points
    pub amount_variance: Decimal,
    pub next_expected_date: NaiveDate,
    pub last_observed_date: NaiveDate,
    pub occurrence_count: i64,
    pub confidence: Confidence,
    pub status: PatternStatus,
    pub origin: PatternOrigin,
    /// User flag: essential bills are never suggested for cancellation
    pub essential: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pattern about to be persisted (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewPattern {
    pub counterparty: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub estimated_amount: Decimal,
    pub amount_variance: Decimal,
    pub next_expected_date: NaiveDate,
    pub last_observed_date: NaiveDate,
    pub occurrence_count: i64,
    pub confidence: Confidence,
    pub origin: PatternOrigin,
    pub essential: bool,
}

/// One day of the balance projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub date: NaiveDate,
    pub expected: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
}

/// The evidence behind a forecast's confidence grade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceInputs {
    pub days_of_history: i64,
    pub transaction_count: usize,
    pub active_patterns: usize,
    pub high_confidence_patterns: usize,
    pub medium_confidence_patterns: usize,
    pub low_confidence_patterns: usize,
    pub account_count: usize,
}

/// A point-in-time cash-flow forecast
///
/// Snapshots are append-only; the newest row per user is the one
/// surfaced to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub computed_at: DateTime<Utc>,
    pub current_balance: Decimal,
    pub safe_to_spend_today: Decimal,
    pub safe_to_spend_week: Decimal,
    /// 30 daily points, tomorrow through day 30
    pub projection: Vec<ProjectionPoint>,
    pub confidence: Confidence,
    pub confidence_inputs: ConfidenceInputs,
    /// 0 (calm) to 100 (act now)
    pub urgency_score: i64,
    /// One human sentence per fired urgency rule
    pub urgency_factors: Vec<String>,
    /// Plain statements of what the projection assumes; never empty
    pub assumptions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ForecastSnapshot {
    /// The day-30 point: where the projection ends up
    pub fn end_of_horizon(&self) -> Option<&ProjectionPoint> {
        self.projection.last()
    }
}

/// Category of a money-saving action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    SubscriptionCancel,
    SpendingCut,
    SavingsBoost,
    DebtReduction,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionCancel => "subscription_cancel",
            Self::SpendingCut => "spending_cut",
            Self::SavingsBoost => "savings_boost",
            Self::DebtReduction => "debt_reduction",
        }
    }

    /// Categories that relieve near-term cash pressure
    pub fn is_cash_flow_relief(&self) -> bool {
        matches!(self, Self::SubscriptionCancel | Self::SpendingCut)
    }
}

impl std::str::FromStr for ActionCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subscription_cancel" => Ok(Self::SubscriptionCancel),
            "spending_cut" => Ok(Self::SpendingCut),
            "savings_boost" => Ok(Self::SavingsBoost),
            "debt_reduction" => Ok(Self::DebtReduction),
            _ => Err(format!("Unknown action category: {}", s)),
        }
    }
}

impl std::fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effort tier of an action candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    QuickWin,
    Moderate,
    Involved,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickWin => "quick_win",
            Self::Moderate => "moderate",
            Self::Involved => "involved",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick_win" => Ok(Self::QuickWin),
            "moderate" => Ok(Self::Moderate),
            "involved" => Ok(Self::Involved),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

/// An entry in the static action catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub id: i64,
    /// Stable key, e.g. "cancel_unused_subscriptions"
    pub key: String,
    pub title: String,
    pub category: ActionCategory,
    /// Transaction category a spending cut targets (e.g. "dining")
    pub spend_category: Option<String>,
    pub difficulty: Difficulty,
    pub est_minutes: i64,
    /// Expected monthly savings range
    pub min_savings: Decimal,
    pub max_savings: Decimal,
    pub active: bool,
}

/// Lifecycle of a user goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Achieved,
    Abandoned,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Achieved => "achieved",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "achieved" => Ok(Self::Achieved),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("Unknown goal status: {}", s)),
        }
    }
}

/// A financial goal the user declared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    /// Goal kind slug, e.g. "emergency_fund" (maps to action categories)
    pub kind: String,
    pub name: String,
    pub target_amount: Option<Decimal>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

/// State of a user's attempt at an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Whether a run in this state keeps the candidate out of new batches
    pub fn blocks_recommendation(&self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// A user's attempt at an action candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRun {
    pub id: i64,
    pub user_id: i64,
    pub candidate_id: i64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A ranked, explained recommendation from the latest batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub user_id: i64,
    pub candidate_id: i64,
    /// 1..=3, contiguous within a batch
    pub rank: i64,
    pub score: f64,
    /// Never Low: weak candidates are dropped instead of surfaced
    pub confidence: Confidence,
    pub template_key: String,
    pub inputs: TemplateInputs,
    /// Rendered explanation; never empty
    pub explanation: String,
    /// Copied from the candidate so a batch is self-describing
    pub quick_win: bool,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn frequency_round_trips() {
        for f in [
            Frequency::Weekly,
            Frequency::Biweekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Annual,
        ] {
            assert_eq!(Frequency::from_str(f.as_str()).unwrap(), f);
        }
        assert_eq!(Frequency::from_str("yearly").unwrap(), Frequency::Annual);
        assert!(Frequency::from_str("fortnightly").is_err());
    }

    #[test]
    fn frequency_interval_falls_in_detection_window() {
        // The nominal interval must land inside the classification window
        // so manual bills keep the same invariant detected patterns do.
        let windows = [
            (Frequency::Weekly, 5, 9),
            (Frequency::Biweekly, 12, 16),
            (Frequency::Monthly, 27, 34),
            (Frequency::Quarterly, 85, 100),
            (Frequency::Annual, 350, 380),
        ];
        for (freq, lo, hi) in windows {
            let days = freq.interval_days();
            assert!(days >= lo && days <= hi, "{} out of window", freq);
        }
    }

    #[test]
    fn confidence_orders_low_to_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn spendable_balance_prefers_available() {
        let mut account = Account {
            id: 1,
            user_id: 1,
            name: "Everyday".into(),
            kind: AccountKind::Checking,
            currency: "USD".into(),
            current_balance: Decimal::new(100_000, 2),
            available_balance: Some(Decimal::new(92_050, 2)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(account.spendable_balance(), Decimal::new(92_050, 2));

        account.available_balance = None;
        assert_eq!(account.spendable_balance(), Decimal::new(100_000, 2));
    }

    #[test]
    fn run_status_blocking() {
        assert!(RunStatus::InProgress.blocks_recommendation());
        assert!(RunStatus::Paused.blocks_recommendation());
        assert!(RunStatus::Completed.blocks_recommendation());
        assert!(!RunStatus::Abandoned.blocks_recommendation());
    }
}

//! Recommendation ranking
//!
//! Scores the action catalog against what is actually known about the
//! user (recurring patterns, goals, recent spend, forecast urgency)
//! and persists the top three as the current batch. A candidate with
//! no supporting signal is dropped, not padded in; a short batch is
//! more honest than a generic one.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::explain::TemplateInputs;
use crate::forecast::monthly_equivalent;
use crate::models::{
    ActionCandidate, ActionCategory, Confidence, Difficulty, Goal, Recommendation,
};

/// How many recommendations a batch surfaces
const BATCH_SIZE: usize = 3;
/// Forecast urgency at which cash-flow relief actions get boosted
const URGENCY_BOOST_THRESHOLD: i64 = 60;
/// Spend categories a spending-cut action may target
const DISCRETIONARY_CATEGORIES: [&str; 3] = ["dining", "shopping", "entertainment"];

/// A scored, ranked recommendation ready to persist
#[derive(Debug, Clone)]
pub struct RankedAction {
    pub candidate_id: i64,
    pub rank: i64,
    pub score: f64,
    pub confidence: Confidence,
    pub template_key: String,
    pub inputs: TemplateInputs,
    pub explanation: String,
    pub quick_win: bool,
    pub batch_id: String,
}

/// A candidate with its score and the evidence behind it
struct Scored {
    candidate: ActionCandidate,
    score: f64,
    parts: Vec<String>,
    goal_match: Option<Goal>,
    category_spend: Option<Decimal>,
    subscription_signal: bool,
    has_user_signal: bool,
}

impl Scored {
    fn is_quick_win(&self) -> bool {
        self.candidate.difficulty == Difficulty::QuickWin
    }
}

/// Recommendation ranking engine
pub struct RecommendationEngine<'a> {
    db: &'a Database,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Score the catalog, keep the top three, and replace the batch
    ///
    /// Candidates the user already acted on (any run not abandoned)
    /// sit out. When a full batch has no quick win but one scored, the
    /// lowest-ranked slot is given up for it.
    pub fn rank(&self, user_id: i64) -> Result<Vec<Recommendation>> {
        let candidates = self.db.list_candidates(true)?;
        let excluded: HashSet<i64> = self.db.excluded_candidate_ids(user_id)?.into_iter().collect();

        let patterns = self.db.active_patterns(user_id)?;
        let non_essential: Vec<_> = patterns.iter().filter(|p| !p.essential).collect();
        let non_essential_monthly: Decimal = non_essential
            .iter()
            .map(|p| monthly_equivalent(p))
            .sum::<Decimal>()
            .round_dp(2);

        let goals = self.db.active_goals(user_id)?;
        let goal_map = self.db.goal_category_map()?;
        let urgency = self
            .db
            .latest_forecast(user_id)?
            .map(|f| f.urgency_score)
            .unwrap_or(0);
        let spend_since = Utc::now() - Duration::days(30);

        let mut scored = Vec::new();
        let mut skipped = 0usize;
        for candidate in candidates {
            if excluded.contains(&candidate.id) {
                debug!("Skipping {}: user already has a run for it", candidate.key);
                skipped += 1;
                continue;
            }

            let entry = self.score_candidate(
                user_id,
                candidate,
                &goals,
                &goal_map,
                non_essential.len(),
                urgency,
                spend_since,
            )?;

            if !entry.has_user_signal {
                debug!("Dropping {}: nothing ties it to this user", entry.candidate.key);
                skipped += 1;
                continue;
            }
            scored.push(entry);
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.candidate.id.cmp(&b.candidate.id))
        });

        let mut rest = scored.split_off(scored.len().min(BATCH_SIZE));
        let mut selected = scored;

        // A full batch should include something doable today
        if selected.len() == BATCH_SIZE && !selected.iter().any(Scored::is_quick_win) {
            if let Some(pos) = rest.iter().position(Scored::is_quick_win) {
                if let Some(slot) = selected.last_mut() {
                    *slot = rest.remove(pos);
                }
            }
        }

        let batch_id = format!("batch-{}", Utc::now().format("%Y%m%d-%H%M%S%.3f"));
        let high_confidence_base = patterns.len() >= 3 && !goals.is_empty();

        let mut actions = Vec::with_capacity(selected.len());
        for (index, entry) in selected.iter().enumerate() {
            let confidence = if high_confidence_base
                || (entry.candidate.category == ActionCategory::SubscriptionCancel
                    && non_essential.len() >= 3)
            {
                Confidence::High
            } else {
                Confidence::Medium
            };

            let mut inputs = choose_template(entry, non_essential.len(), non_essential_monthly);
            let mut explanation = inputs.render();
            if explanation.trim().is_empty() {
                inputs = generic_inputs(&entry.candidate);
                explanation = inputs.render();
            }

            actions.push(RankedAction {
                candidate_id: entry.candidate.id,
                rank: (index + 1) as i64,
                score: entry.score,
                confidence,
                template_key: inputs.template_key().to_string(),
                inputs,
                explanation,
                quick_win: entry.is_quick_win(),
                batch_id: batch_id.clone(),
            });
        }

        self.db.replace_recommendations(user_id, &actions)?;

        info!(
            "Ranked {} recommendation(s) for user {} ({} candidates sat out)",
            actions.len(),
            user_id,
            skipped
        );

        let breakdown: Vec<_> = selected
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "candidate": entry.candidate.key,
                    "score": entry.score,
                    "parts": entry.parts,
                })
            })
            .collect();
        let details = serde_json::json!({
            "batch_id": batch_id,
            "ranked": breakdown,
            "skipped": skipped,
        });
        if let Err(e) = self.db.record_event(
            user_id,
            "recommendations_ranked",
            Some("recommendation"),
            None,
            Some(&details.to_string()),
        ) {
            warn!("Failed to record ranking audit event: {}", e);
        }

        self.db.current_recommendations(user_id)
    }

    #[allow(clippy::too_many_arguments)]
    fn score_candidate(
        &self,
        user_id: i64,
        candidate: ActionCandidate,
        goals: &[Goal],
        goal_map: &[(String, ActionCategory)],
        non_essential_count: usize,
        urgency: i64,
        spend_since: DateTime<Utc>,
    ) -> Result<Scored> {
        let mut score = 0.0;
        let mut parts = Vec::new();
        let mut has_user_signal = false;

        if candidate.difficulty == Difficulty::QuickWin {
            score += 30.0;
            parts.push("quick win +30".to_string());
        }

        let goal_match = goals
            .iter()
            .find(|goal| {
                goal_map
                    .iter()
                    .any(|(kind, category)| kind == &goal.kind && *category == candidate.category)
            })
            .cloned();
        if let Some(goal) = &goal_match {
            score += 25.0;
            parts.push(format!("supports goal \"{}\" +25", goal.name));
            has_user_signal = true;
        }

        let savings_points = candidate.max_savings.to_f64().unwrap_or(0.0) * 0.5;
        score += savings_points;
        parts.push(format!("savings potential +{:.1}", savings_points));

        let mut subscription_signal = false;
        if candidate.category == ActionCategory::SubscriptionCancel && non_essential_count > 0 {
            score += 20.0;
            parts.push(format!("{} cancellable subscription(s) +20", non_essential_count));
            subscription_signal = true;
            has_user_signal = true;
        }

        let mut category_spend = None;
        if candidate.category == ActionCategory::SpendingCut {
            if let Some(spend_category) = candidate
                .spend_category
                .as_deref()
                .filter(|c| DISCRETIONARY_CATEGORIES.contains(c))
            {
                let recent = self.db.category_debit_total(user_id, spend_category, spend_since)?;
                if recent > Decimal::ZERO {
                    let bonus = (recent.to_f64().unwrap_or(0.0) * 0.1).min(25.0);
                    score += bonus;
                    parts.push(format!("${} recent {} spend +{:.1}", recent, spend_category, bonus));
                    category_spend = Some(recent);
                    has_user_signal = true;
                }
            }
        }

        if urgency >= URGENCY_BOOST_THRESHOLD && candidate.category.is_cash_flow_relief() {
            score += 10.0;
            parts.push("cash-flow pressure +10".to_string());
            has_user_signal = true;
        }

        Ok(Scored {
            candidate,
            score,
            parts,
            goal_match,
            category_spend,
            subscription_signal,
            has_user_signal,
        })
    }
}

/// Pick the strongest template the evidence supports
fn choose_template(entry: &Scored, pattern_count: usize, monthly_total: Decimal) -> TemplateInputs {
    let candidate = &entry.candidate;

    if let Some(goal) = &entry.goal_match {
        return TemplateInputs::GoalAligned {
            action_title: candidate.title.clone(),
            goal_name: goal.name.clone(),
            max_monthly_savings: candidate.max_savings,
        };
    }
    if entry.subscription_signal {
        return TemplateInputs::SubscriptionAudit {
            pattern_count,
            monthly_total,
        };
    }
    if let (Some(recent_total), Some(category)) =
        (entry.category_spend, candidate.spend_category.as_ref())
    {
        return TemplateInputs::CategorySpend {
            action_title: candidate.title.clone(),
            category: category.clone(),
            recent_total,
        };
    }
    if candidate.difficulty == Difficulty::QuickWin {
        return TemplateInputs::QuickWin {
            action_title: candidate.title.clone(),
            est_minutes: candidate.est_minutes,
            max_monthly_savings: candidate.max_savings,
        };
    }
    generic_inputs(candidate)
}

fn generic_inputs(candidate: &ActionCandidate) -> TemplateInputs {
    TemplateInputs::GenericSavings {
        action_title: candidate.title.clone(),
        min_monthly_savings: candidate.min_savings,
        max_monthly_savings: candidate.max_savings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::add_manual_bill;
    use crate::models::{AccountKind, Direction, Frequency, NewTransaction, RunStatus};
    use rusqlite::params;

    fn seed_debit(db: &Database, days_ago: i64, category: &str, amount: &str) {
        let tx = NewTransaction {
            posted_at: Utc::now() - Duration::days(days_ago),
            description: format!("{} purchase", category),
            counterparty: Some("SOME SHOP".to_string()),
            category: Some(category.to_string()),
            amount: amount.parse().unwrap(),
            direction: Direction::Debit,
            pending: false,
            import_hash: None,
        };
        db.insert_transaction(1, None, &tx).unwrap();
    }

    fn seed_subscription(db: &Database, name: &str, amount: &str) {
        add_manual_bill(
            db,
            1,
            name,
            amount.parse().unwrap(),
            Frequency::Monthly,
            Utc::now().date_naive() + Duration::days(14),
            None,
            false,
        )
        .unwrap();
    }

    fn insert_candidate(
        db: &Database,
        key: &str,
        category: &str,
        difficulty: &str,
        max_savings: &str,
    ) -> i64 {
        let conn = db.conn().unwrap();
        conn.execute(
            r#"
            INSERT INTO action_candidates (key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active)
            VALUES (?, ?, ?, NULL, ?, 30, '5', ?, 1)
            "#,
            params![key, format!("Action {}", key), category, difficulty, max_savings],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn candidate_id(db: &Database, key: &str) -> i64 {
        db.get_candidate_by_key(key).unwrap().unwrap().id
    }

    fn insert_goal_category_rows(db: &Database, rows: &[(&str, &str)]) {
        let conn = db.conn().unwrap();
        for (goal_kind, action_category) in rows {
            conn.execute(
                "INSERT INTO goal_category_map (goal_kind, action_category) VALUES (?, ?)",
                params![goal_kind, action_category],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_user_with_no_signals_gets_empty_batch() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();
        assert!(recommendations.is_empty());
        assert!(db.current_recommendations(1).unwrap().is_empty());
    }

    #[test]
    fn test_goal_alignment_selects_and_explains() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();
        db.add_goal(1, "emergency_fund", "Emergency fund", Some("3000".parse().unwrap()))
            .unwrap();

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();

        // Only the two savings-boost actions tie to this goal
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].rank, 1);
        assert_eq!(recommendations[1].rank, 2);
        assert_eq!(
            recommendations[0].candidate_id,
            candidate_id(&db, "automate_savings_transfer")
        );
        for rec in &recommendations {
            assert_eq!(rec.template_key, "goal_aligned");
            assert!(rec.explanation.contains("Emergency fund"));
            assert_eq!(rec.confidence, Confidence::Medium);
        }
        assert!(recommendations[0].quick_win);
        assert!(!recommendations[1].quick_win);
    }

    #[test]
    fn test_full_signals_fill_a_high_confidence_batch() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();
        db.add_goal(1, "reduce_spending", "Spend less", None).unwrap();
        seed_subscription(&db, "Streaming A", "15.99");
        seed_subscription(&db, "Streaming B", "11.99");
        seed_subscription(&db, "Cloud storage", "2.99");
        for day in 1..=10 {
            seed_debit(&db, day, "dining", "30.00");
        }

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();

        assert_eq!(recommendations.len(), 3);
        let ranks: Vec<i64> = recommendations.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(
            recommendations[0].candidate_id,
            candidate_id(&db, "trim_dining_out")
        );
        for rec in &recommendations {
            assert_eq!(rec.confidence, Confidence::High);
            assert!(!rec.explanation.is_empty());
            assert_eq!(rec.batch_id, recommendations[0].batch_id);
        }
        assert!(recommendations.iter().any(|r| r.quick_win));
    }

    #[test]
    fn test_quick_win_replaces_lowest_slot() {
        let db = Database::in_memory().unwrap();
        let slow_a = insert_candidate(&db, "consolidate_loans", "debt_reduction", "involved", "300");
        let slow_b = insert_candidate(&db, "negotiate_rent", "spending_cut", "involved", "250");
        let slow_c = insert_candidate(&db, "refinance_auto", "spending_cut", "moderate", "200");
        let quick = insert_candidate(&db, "pause_box_sub", "subscription_cancel", "quick_win", "40");
        insert_goal_category_rows(
            &db,
            &[
                ("debt_free", "debt_reduction"),
                ("reduce_spending", "spending_cut"),
                ("reduce_spending", "subscription_cancel"),
            ],
        );

        db.add_goal(1, "debt_free", "Debt free", None).unwrap();
        db.add_goal(1, "reduce_spending", "Spend less", None).unwrap();
        seed_subscription(&db, "Snack box", "24.99");

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();

        assert_eq!(recommendations.len(), 3);
        assert_eq!(recommendations[0].candidate_id, slow_a);
        assert_eq!(recommendations[1].candidate_id, slow_b);
        // The third slot goes to the quick win even though it scored lower
        assert_eq!(recommendations[2].candidate_id, quick);
        assert!(recommendations[2].quick_win);
        assert!(!recommendations.iter().any(|r| r.candidate_id == slow_c));
        assert_eq!(recommendations[2].score, 95.0);
    }

    #[test]
    fn test_acted_on_candidates_sit_out_until_abandoned() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();
        db.add_goal(1, "emergency_fund", "Emergency fund", None).unwrap();

        let automate = candidate_id(&db, "automate_savings_transfer");
        let run_id = db.start_action_run(1, automate).unwrap();

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(
            recommendations[0].candidate_id,
            candidate_id(&db, "open_high_yield_savings")
        );

        db.set_run_status(run_id, RunStatus::Abandoned).unwrap();
        let again = RecommendationEngine::new(&db).rank(1).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].candidate_id, automate);
    }

    #[test]
    fn test_reranking_replaces_the_batch() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();
        db.add_goal(1, "emergency_fund", "Emergency fund", None).unwrap();

        let first = RecommendationEngine::new(&db).rank(1).unwrap();
        let second = RecommendationEngine::new(&db).rank(1).unwrap();

        assert_eq!(first.len(), second.len());
        let stored = db.current_recommendations(1).unwrap();
        assert_eq!(stored.len(), second.len());
        assert!(stored.iter().all(|r| r.batch_id == second[0].batch_id));
    }

    #[test]
    fn test_urgent_forecast_boosts_cash_flow_relief() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();

        let account = db.upsert_account(1, "Checking", AccountKind::Checking).unwrap();
        db.set_account_balances(account, "50.00".parse().unwrap(), None).unwrap();
        for day in 0..90 {
            seed_debit(&db, day, "dining", "10.00");
        }
        seed_subscription(&db, "Streaming", "9.99");

        let forecast = crate::forecast::ForecastEngine::new(&db).run(1).unwrap();
        assert!(forecast.urgency_score >= URGENCY_BOOST_THRESHOLD);

        let recommendations = RecommendationEngine::new(&db).rank(1).unwrap();
        assert_eq!(recommendations.len(), 3);
        assert_eq!(
            recommendations[0].candidate_id,
            candidate_id(&db, "trim_dining_out")
        );
        let cancel = recommendations
            .iter()
            .find(|r| r.candidate_id == candidate_id(&db, "cancel_unused_subscriptions"))
            .unwrap();
        // 30 quick win + 22.5 savings + 20 subscriptions + 10 urgency
        assert_eq!(cancel.score, 82.5);
        assert_eq!(cancel.template_key, "subscription_audit");
    }
}

//! Integration tests for keel-core
//!
//! These tests exercise the full import → detect → forecast → recommend
//! pipeline the way the CLI drives it.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use keel_core::{
    db::Database,
    detect::{add_manual_bill, PatternDetector},
    forecast::ForecastEngine,
    import::import_reader,
    models::{AccountKind, Confidence, Frequency, RunStatus},
    recommend::RecommendationEngine,
};

const CSV_HEADER: &str = "date,description,counterparty,category,amount,direction,pending";

const KNOWN_TEMPLATES: [&str; 5] = [
    "goal_aligned",
    "subscription_audit",
    "category_spend",
    "quick_win",
    "generic_savings",
];

fn date(days_ago: i64) -> String {
    (Utc::now() - Duration::days(days_ago)).date_naive().to_string()
}

fn money(s: &str) -> Decimal {
    s.parse().expect("literal decimal")
}

/// Two clean monthly subscriptions, a 45-day imposter, and a one-off
fn sample_csv() -> String {
    let mut rows = vec![CSV_HEADER.to_string()];
    for (days_ago, amount) in [(100, "15.99"), (70, "16.49"), (40, "15.49"), (10, "15.99")] {
        rows.push(format!(
            "{},Netflix monthly,NETFLIX,entertainment,{},debit,",
            date(days_ago),
            amount
        ));
    }
    for days_ago in [95, 65, 35, 5] {
        rows.push(format!(
            "{},Spotify family,SPOTIFY,entertainment,10.99,debit,",
            date(days_ago)
        ));
    }
    // 45-day gap: not a billing cadence
    for days_ago in [80, 35] {
        rows.push(format!("{},Gym day pass,GYM,health,25.00,debit,", date(days_ago)));
    }
    rows.push(format!(
        "{},Drill press,HARDWARE STORE,shopping,82.13,debit,",
        date(55)
    ));
    rows.join("\n") + "\n"
}

fn seed_account(db: &Database, balance: &str) {
    let id = db
        .upsert_account(1, "Everyday Checking", AccountKind::Checking)
        .expect("create account");
    db.set_account_balances(id, money(balance), None)
        .expect("set balance");
}

// =============================================================================
// Detection
// =============================================================================

#[test]
fn test_import_then_detect_finds_monthly_subscriptions() {
    let db = Database::in_memory().expect("in-memory database");

    let summary = import_reader(&db, 1, None, sample_csv().as_bytes()).expect("import");
    assert_eq!(summary.imported, 11);
    assert_eq!(summary.skipped, 0);

    let patterns = PatternDetector::new(&db).detect(1).expect("detect");
    assert_eq!(patterns.len(), 2, "expected Netflix and Spotify only");

    let names: Vec<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"NETFLIX"));
    assert!(names.contains(&"SPOTIFY"));
    assert!(!names.contains(&"GYM"), "45-day gaps are not a cadence");
    assert!(!names.contains(&"HARDWARE STORE"), "one-offs are not patterns");

    let netflix = patterns.iter().find(|p| p.name == "NETFLIX").unwrap();
    assert_eq!(netflix.frequency, Frequency::Monthly);
    assert_eq!(netflix.confidence, Confidence::High);
    assert_eq!(netflix.estimated_amount, money("15.99"));
    assert_eq!(netflix.occurrence_count, 4);
}

#[test]
fn test_every_persisted_pattern_respects_its_frequency_window() {
    let db = Database::in_memory().expect("in-memory database");
    import_reader(&db, 1, None, sample_csv().as_bytes()).expect("import");
    add_manual_bill(
        &db,
        1,
        "Insurance",
        money("120"),
        Frequency::Quarterly,
        Utc::now().date_naive() + Duration::days(20),
        None,
        true,
    )
    .expect("manual bill");

    let patterns = PatternDetector::new(&db).detect(1).expect("detect");
    assert_eq!(patterns.len(), 3);

    for pattern in &patterns {
        let gap = (pattern.next_expected_date - pattern.last_observed_date).num_days();
        let window = match pattern.frequency {
            Frequency::Weekly => 5..=9,
            Frequency::Biweekly => 12..=16,
            Frequency::Monthly => 27..=34,
            Frequency::Quarterly => 85..=100,
            Frequency::Annual => 350..=380,
        };
        assert!(
            window.contains(&gap),
            "{}: {} day gap outside its {} window",
            pattern.name,
            gap,
            pattern.frequency
        );
    }
}

#[test]
fn test_detection_reruns_are_equivalent() {
    let db = Database::in_memory().expect("in-memory database");
    import_reader(&db, 1, None, sample_csv().as_bytes()).expect("import");

    let describe = |db: &Database| -> Vec<(String, Frequency, Decimal, Confidence)> {
        let mut seen: Vec<_> = PatternDetector::new(db)
            .detect(1)
            .expect("detect")
            .into_iter()
            .map(|p| (p.name, p.frequency, p.estimated_amount, p.confidence))
            .collect();
        seen.sort();
        seen
    };

    let first = describe(&db);
    let second = describe(&db);
    assert_eq!(first, second, "unchanged history must detect identically");
}

#[test]
fn test_failed_detection_leaves_previous_generation_intact() {
    let db = Database::in_memory().expect("in-memory database");

    let mut netflix_rows = vec![CSV_HEADER.to_string()];
    for (days_ago, amount) in [(100, "15.99"), (70, "16.49"), (40, "15.49"), (10, "15.99")] {
        netflix_rows.push(format!(
            "{},Netflix monthly,NETFLIX,entertainment,{},debit,",
            date(days_ago),
            amount
        ));
    }
    import_reader(&db, 1, None, netflix_rows.join("\n").as_bytes()).expect("import");

    let before = PatternDetector::new(&db).detect(1).expect("first detect");
    assert_eq!(before.len(), 1);

    // Abort any rewrite that stages a second pattern
    db.conn()
        .expect("conn")
        .execute_batch(
            r#"
            CREATE TRIGGER block_staging AFTER INSERT ON recurring_patterns
            WHEN (SELECT COUNT(*) FROM recurring_patterns WHERE staged = 1) >= 2
            BEGIN
                SELECT RAISE(ABORT, 'staging blocked');
            END
            "#,
        )
        .expect("create trigger");

    let mut spotify_rows = vec![CSV_HEADER.to_string()];
    for days_ago in [95, 65, 35, 5] {
        spotify_rows.push(format!(
            "{},Spotify family,SPOTIFY,entertainment,10.99,debit,",
            date(days_ago)
        ));
    }
    import_reader(&db, 1, None, spotify_rows.join("\n").as_bytes()).expect("import");

    let result = PatternDetector::new(&db).detect(1);
    assert!(result.is_err(), "blocked rewrite should surface as an error");

    let after = db.list_patterns(1).expect("list");
    assert_eq!(after.len(), 1, "previous generation must survive a failed rewrite");
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].name, "NETFLIX");
}

// =============================================================================
// Forecasting
// =============================================================================

#[test]
fn test_bill_due_today_reduces_safe_to_spend() {
    let db = Database::in_memory().expect("in-memory database");
    seed_account(&db, "1000.00");
    add_manual_bill(
        &db,
        1,
        "Streaming",
        money("15.99"),
        Frequency::Monthly,
        Utc::now().date_naive(),
        None,
        false,
    )
    .expect("manual bill");

    let snapshot = ForecastEngine::new(&db).run(1).expect("forecast");
    assert_eq!(snapshot.current_balance, money("1000.00"));
    assert_eq!(snapshot.safe_to_spend_today, money("984.01"));
}

#[test]
fn test_projection_bands_never_invert() {
    let db = Database::in_memory().expect("in-memory database");
    seed_account(&db, "2000.00");

    let mut rows = vec![CSV_HEADER.to_string()];
    for day in 1..=60 {
        let amount = match day % 3 {
            0 => "55.00",
            1 => "4.25",
            _ => "18.50",
        };
        rows.push(format!("{},Card purchase,VARIOUS,shopping,{},debit,", date(day), amount));
    }
    import_reader(&db, 1, None, rows.join("\n").as_bytes()).expect("import");

    let snapshot = ForecastEngine::new(&db).run(1).expect("forecast");
    assert_eq!(snapshot.projection.len(), 30);
    for point in &snapshot.projection {
        assert!(point.lower <= point.expected, "lower band inverted at {}", point.date);
        assert!(point.expected <= point.upper, "upper band inverted at {}", point.date);
    }
}

#[test]
fn test_urgency_is_capped_with_a_factor_per_fired_rule() {
    let db = Database::in_memory().expect("in-memory database");
    seed_account(&db, "50.00");

    let mut rows = vec![CSV_HEADER.to_string()];
    for day in 0..90 {
        rows.push(format!("{},Lunch,CANTEEN,dining,10.00,debit,", date(day)));
    }
    import_reader(&db, 1, None, rows.join("\n").as_bytes()).expect("import");

    add_manual_bill(
        &db,
        1,
        "Car insurance",
        money("120.00"),
        Frequency::Monthly,
        Utc::now().date_naive() - Duration::days(1),
        None,
        true,
    )
    .expect("manual bill");

    // Short runway (+40), overdue obligation (+30), negative horizon (+30)
    let snapshot = ForecastEngine::new(&db).run(1).expect("forecast");
    assert_eq!(snapshot.urgency_score, 100);
    assert_eq!(snapshot.urgency_factors.len(), 3);

    // And a quiet user sits at zero with no factors
    let quiet = Database::in_memory().expect("in-memory database");
    let calm = ForecastEngine::new(&quiet).run(1).expect("forecast");
    assert_eq!(calm.urgency_score, 0);
    assert!(calm.urgency_factors.is_empty());
}

// =============================================================================
// Recommendation ranking
// =============================================================================

#[test]
fn test_full_pipeline_produces_a_well_formed_batch() {
    let db = Database::in_memory().expect("in-memory database");
    db.seed_default_catalog().expect("seed catalog");
    seed_account(&db, "800.00");
    db.add_goal(1, "reduce_spending", "Spend less", None).expect("goal");

    import_reader(&db, 1, None, sample_csv().as_bytes()).expect("import");
    PatternDetector::new(&db).detect(1).expect("detect");
    ForecastEngine::new(&db).run(1).expect("forecast");
    let recommendations = RecommendationEngine::new(&db).rank(1).expect("rank");

    assert_eq!(recommendations.len(), 3);
    for (index, rec) in recommendations.iter().enumerate() {
        assert_eq!(rec.rank, index as i64 + 1, "ranks must be contiguous from 1");
        assert_ne!(rec.confidence, Confidence::Low, "surfaced advice is never low-trust");
        assert!(KNOWN_TEMPLATES.contains(&rec.template_key.as_str()));
        assert!(!rec.explanation.trim().is_empty());
    }
    assert!(
        recommendations.iter().any(|r| r.quick_win),
        "a full batch must carry something doable today"
    );

    let events = db.recent_events(1, 20).expect("events");
    for expected in [
        "transactions_imported",
        "patterns_detected",
        "forecast_computed",
        "recommendations_ranked",
    ] {
        assert!(
            events.iter().any(|e| e.event_type == expected),
            "missing audit event {}",
            expected
        );
    }
}

#[test]
fn test_candidates_with_open_runs_never_rank() {
    let db = Database::in_memory().expect("in-memory database");
    db.seed_default_catalog().expect("seed catalog");
    db.add_goal(1, "emergency_fund", "Emergency fund", None).expect("goal");

    let automate = db
        .get_candidate_by_key("automate_savings_transfer")
        .expect("lookup")
        .expect("seeded");
    let run_id = db.start_action_run(1, automate.id).expect("start run");

    let in_progress = RecommendationEngine::new(&db).rank(1).expect("rank");
    assert!(in_progress.iter().all(|r| r.candidate_id != automate.id));

    db.set_run_status(run_id, RunStatus::Paused).expect("pause");
    let paused = RecommendationEngine::new(&db).rank(1).expect("rank");
    assert!(paused.iter().all(|r| r.candidate_id != automate.id));

    db.set_run_status(run_id, RunStatus::Abandoned).expect("abandon");
    let abandoned = RecommendationEngine::new(&db).rank(1).expect("rank");
    assert!(abandoned.iter().any(|r| r.candidate_id == automate.id));
}

#[test]
fn test_quick_win_displaces_the_lowest_of_a_slow_top_three() {
    let db = Database::in_memory().expect("in-memory database");
    {
        let conn = db.conn().expect("conn");
        let rows = [
            ("consolidate_loans", "debt_reduction", "involved", "300"),
            ("negotiate_rent", "spending_cut", "involved", "250"),
            ("refinance_auto", "spending_cut", "moderate", "200"),
            ("pause_box_sub", "subscription_cancel", "quick_win", "40"),
        ];
        for (key, category, difficulty, max_savings) in rows {
            conn.execute(
                r#"
                INSERT INTO action_candidates (key, title, category, spend_category, difficulty, est_minutes, min_savings, max_savings, active)
                VALUES (?, ?, ?, NULL, ?, 30, '5', ?, 1)
                "#,
                rusqlite::params![key, format!("Action {}", key), category, difficulty, max_savings],
            )
            .expect("insert candidate");
        }
        let map_rows = [
            ("debt_free", "debt_reduction"),
            ("reduce_spending", "spending_cut"),
            ("reduce_spending", "subscription_cancel"),
        ];
        for (goal_kind, action_category) in map_rows {
            conn.execute(
                "INSERT INTO goal_category_map (goal_kind, action_category) VALUES (?, ?)",
                rusqlite::params![goal_kind, action_category],
            )
            .expect("insert goal category mapping");
        }
    }
    db.add_goal(1, "debt_free", "Debt free", None).expect("goal");
    db.add_goal(1, "reduce_spending", "Spend less", None).expect("goal");
    add_manual_bill(
        &db,
        1,
        "Snack box",
        money("24.99"),
        Frequency::Monthly,
        Utc::now().date_naive() + Duration::days(14),
        None,
        false,
    )
    .expect("manual bill");

    let recommendations = RecommendationEngine::new(&db).rank(1).expect("rank");
    assert_eq!(recommendations.len(), 3);

    let quick = db
        .get_candidate_by_key("pause_box_sub")
        .expect("lookup")
        .expect("inserted");
    let displaced = db
        .get_candidate_by_key("refinance_auto")
        .expect("lookup")
        .expect("inserted");
    assert_eq!(recommendations[2].candidate_id, quick.id);
    assert!(recommendations[2].quick_win);
    assert!(recommendations.iter().all(|r| r.candidate_id != displaced.id));
}

//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::params;
    use rust_decimal::Decimal;

    fn dt(s: &str) -> DateTime<Utc> {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    fn money(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn new_tx(
        posted: &str,
        description: &str,
        counterparty: Option<&str>,
        category: Option<&str>,
        amount: &str,
        direction: Direction,
        pending: bool,
        hash: &str,
    ) -> NewTransaction {
        NewTransaction {
            posted_at: dt(posted),
            description: description.to_string(),
            counterparty: counterparty.map(String::from),
            category: category.map(String::from),
            amount: money(amount),
            direction,
            pending,
            import_hash: Some(hash.to_string()),
        }
    }

    fn new_pattern(counterparty: &str, origin: PatternOrigin) -> NewPattern {
        NewPattern {
            counterparty: Some(counterparty.to_string()),
            name: counterparty.to_string(),
            category: Some("entertainment".to_string()),
            frequency: Frequency::Monthly,
            estimated_amount: money("15.99"),
            amount_variance: money("0.25"),
            next_expected_date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            last_observed_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            occurrence_count: 4,
            confidence: Confidence::High,
            origin,
            essential: false,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let accounts = db.list_accounts(1).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('recurring_patterns') WHERE name IN ('id', 'counterparty', 'frequency', 'estimated_amount', 'amount_variance', 'next_expected_date', 'confidence', 'status', 'origin', 'essential', 'staged')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            result, 11,
            "recurring_patterns table should have 11 expected columns"
        );

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('forecast_snapshots') WHERE name IN ('id', 'safe_to_spend_today', 'safe_to_spend_week', 'projection_json', 'urgency_score', 'assumptions_json')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            result, 6,
            "forecast_snapshots table should have 6 expected columns"
        );

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('recommendations') WHERE name IN ('id', 'candidate_id', 'rank', 'score', 'template_key', 'batch_id')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            result, 6,
            "recommendations table should have 6 expected columns"
        );
    }

    #[test]
    fn test_account_crud() {
        let db = Database::in_memory().unwrap();

        let id = db
            .upsert_account(1, "Everyday", AccountKind::Checking)
            .unwrap();
        assert!(id > 0);

        // Upsert same account returns same ID
        let id2 = db
            .upsert_account(1, "Everyday", AccountKind::Checking)
            .unwrap();
        assert_eq!(id, id2);

        db.set_account_balances(id, money("1204.50"), Some(money("1150.00")))
            .unwrap();

        let accounts = db.list_accounts(1).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Everyday");
        assert_eq!(accounts[0].current_balance, money("1204.50"));
        assert_eq!(accounts[0].available_balance, Some(money("1150.00")));
        assert_eq!(accounts[0].spendable_balance(), money("1150.00"));
    }

    #[test]
    fn test_accounts_scoped_by_user() {
        let db = Database::in_memory().unwrap();

        db.upsert_account(1, "Mine", AccountKind::Checking).unwrap();
        db.upsert_account(2, "Theirs", AccountKind::Savings).unwrap();

        let mine = db.list_accounts(1).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Mine");
    }

    #[test]
    fn test_transaction_insert_dedup() {
        let db = Database::in_memory().unwrap();

        let tx = new_tx(
            "2024-06-01 00:00:00",
            "NETFLIX.COM",
            Some("Netflix"),
            Some("entertainment"),
            "15.99",
            Direction::Debit,
            false,
            "hash1",
        );

        let id = db.insert_transaction(1, None, &tx).unwrap();
        assert!(id.is_some());

        // Same hash skips
        let id2 = db.insert_transaction(1, None, &tx).unwrap();
        assert!(id2.is_none());

        assert_eq!(db.count_transactions(1).unwrap(), 1);
    }

    #[test]
    fn test_batch_insert_counts_duplicates() {
        let db = Database::in_memory().unwrap();

        let txs = vec![
            new_tx("2024-06-01 00:00:00", "A", None, None, "10.00", Direction::Debit, false, "h1"),
            new_tx("2024-06-02 00:00:00", "B", None, None, "20.00", Direction::Debit, false, "h2"),
        ];

        let outcome = db.insert_transactions(1, None, &txs).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.duplicates, 0);

        // Re-import the same batch plus one new row
        let mut again = txs.clone();
        again.push(new_tx(
            "2024-06-03 00:00:00",
            "C",
            None,
            None,
            "30.00",
            Direction::Debit,
            false,
            "h3",
        ));
        let outcome = db.insert_transactions(1, None, &again).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates, 2);
        assert_eq!(db.count_transactions(1).unwrap(), 3);
    }

    #[test]
    fn test_transactions_since_ordering() {
        let db = Database::in_memory().unwrap();

        let txs = vec![
            new_tx("2024-06-10 00:00:00", "later", None, None, "1.00", Direction::Debit, false, "h1"),
            new_tx("2024-06-01 00:00:00", "earlier", None, None, "2.00", Direction::Debit, false, "h2"),
            new_tx("2024-05-01 00:00:00", "too old", None, None, "3.00", Direction::Debit, false, "h3"),
        ];
        db.insert_transactions(1, None, &txs).unwrap();

        let since = db
            .transactions_since(1, dt("2024-06-01 00:00:00"))
            .unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].description, "earlier");
        assert_eq!(since[1].description, "later");
    }

    #[test]
    fn test_detection_input_filters() {
        let db = Database::in_memory().unwrap();

        let txs = vec![
            // Qualifies
            new_tx("2024-06-01 00:00:00", "NETFLIX", Some("Netflix"), None, "15.99", Direction::Debit, false, "h1"),
            // Pending: excluded
            new_tx("2024-06-02 00:00:00", "NETFLIX", Some("Netflix"), None, "15.99", Direction::Debit, true, "h2"),
            // Credit: excluded
            new_tx("2024-06-03 00:00:00", "PAYROLL", Some("Employer"), None, "2000.00", Direction::Credit, false, "h3"),
            // No counterparty: excluded
            new_tx("2024-06-04 00:00:00", "ATM 8821", None, None, "40.00", Direction::Debit, false, "h4"),
        ];
        db.insert_transactions(1, None, &txs).unwrap();

        let input = db
            .debit_transactions_with_counterparty(1, dt("2024-01-01 00:00:00"))
            .unwrap();
        assert_eq!(input.len(), 1);
        assert_eq!(input[0].counterparty.as_deref(), Some("Netflix"));
    }

    #[test]
    fn test_category_debit_total() {
        let db = Database::in_memory().unwrap();

        let txs = vec![
            new_tx("2024-06-01 00:00:00", "CAFE", None, Some("dining"), "25.50", Direction::Debit, false, "h1"),
            new_tx("2024-06-05 00:00:00", "BISTRO", None, Some("dining"), "42.00", Direction::Debit, false, "h2"),
            new_tx("2024-06-07 00:00:00", "REFUND", None, Some("dining"), "10.00", Direction::Credit, false, "h3"),
            new_tx("2024-06-09 00:00:00", "BOOKS", None, Some("shopping"), "30.00", Direction::Debit, false, "h4"),
        ];
        db.insert_transactions(1, None, &txs).unwrap();

        let total = db
            .category_debit_total(1, "dining", dt("2024-01-01 00:00:00"))
            .unwrap();
        assert_eq!(total, money("67.50"));
    }

    #[test]
    fn test_manual_pattern_crud() {
        let db = Database::in_memory().unwrap();

        let mut p = new_pattern("Rent", PatternOrigin::Manual);
        p.essential = true;
        let id = db.insert_manual_pattern(1, &p).unwrap();
        assert!(id > 0);

        let patterns = db.list_patterns(1).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].origin, PatternOrigin::Manual);
        assert!(patterns[0].essential);
        assert_eq!(patterns[0].estimated_amount, money("15.99"));

        db.set_pattern_status(id, PatternStatus::Paused).unwrap();
        let p = db.get_pattern(id).unwrap().unwrap();
        assert_eq!(p.status, PatternStatus::Paused);

        db.set_pattern_essential(id, false).unwrap();
        let p = db.get_pattern(id).unwrap().unwrap();
        assert!(!p.essential);

        // Paused patterns drop out of the active set
        assert!(db.active_patterns(1).unwrap().is_empty());
    }

    #[test]
    fn test_replace_detected_preserves_manual() {
        let db = Database::in_memory().unwrap();

        db.insert_manual_pattern(1, &new_pattern("Rent", PatternOrigin::Manual))
            .unwrap();
        db.replace_detected_patterns(1, &[new_pattern("Netflix", PatternOrigin::Detected)])
            .unwrap();

        let patterns = db.list_patterns(1).unwrap();
        assert_eq!(patterns.len(), 2);

        // Second run replaces the detected generation only
        db.replace_detected_patterns(
            1,
            &[
                new_pattern("Spotify", PatternOrigin::Detected),
                new_pattern("Gym", PatternOrigin::Detected),
            ],
        )
        .unwrap();

        let patterns = db.list_patterns(1).unwrap();
        assert_eq!(patterns.len(), 3);
        let names: Vec<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"Rent"));
        assert!(names.contains(&"Spotify"));
        assert!(names.contains(&"Gym"));
        assert!(!names.contains(&"Netflix"));
    }

    #[test]
    fn test_replace_detected_with_empty_set_clears() {
        let db = Database::in_memory().unwrap();

        db.replace_detected_patterns(1, &[new_pattern("Netflix", PatternOrigin::Detected)])
            .unwrap();
        assert_eq!(db.list_patterns(1).unwrap().len(), 1);

        db.replace_detected_patterns(1, &[]).unwrap();
        assert!(db.list_patterns(1).unwrap().is_empty());
    }

    #[test]
    fn test_staged_rows_invisible_to_readers() {
        let db = Database::in_memory().unwrap();

        // A row stranded mid-rewrite must never surface
        {
            let conn = db.conn().unwrap();
            conn.execute(
                r#"
                INSERT INTO recurring_patterns
                    (user_id, counterparty, name, frequency, estimated_amount, amount_variance,
                     next_expected_date, last_observed_date, occurrence_count, confidence, origin, staged)
                VALUES (1, 'Ghost', 'Ghost', 'monthly', '9.99', '0', '2024-07-01', '2024-06-01', 3, 'high', 'detected', 1)
                "#,
                params![],
            )
            .unwrap();
        }

        assert!(db.list_patterns(1).unwrap().is_empty());
        assert!(db.active_patterns(1).unwrap().is_empty());
    }

    #[test]
    fn test_catalog_seed_idempotent() {
        let db = Database::in_memory().unwrap();

        let first = db.seed_default_catalog().unwrap();
        assert!(first > 0);

        let second = db.seed_default_catalog().unwrap();
        assert_eq!(second, 0, "Re-seeding should not duplicate entries");

        let candidates = db.list_candidates(true).unwrap();
        assert_eq!(candidates.len(), first);

        let keys: Vec<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
        assert!(keys.contains(&"cancel_unused_subscriptions"));
        assert!(keys.contains(&"trim_dining_out"));

        let map = db.goal_category_map().unwrap();
        assert!(map
            .iter()
            .any(|(kind, cat)| kind == "emergency_fund" && *cat == ActionCategory::SavingsBoost));
    }

    #[test]
    fn test_goal_crud() {
        let db = Database::in_memory().unwrap();

        let id = db
            .add_goal(1, "emergency_fund", "Rainy day fund", Some(money("3000")))
            .unwrap();
        assert!(id > 0);

        let goals = db.active_goals(1).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].kind, "emergency_fund");
        assert_eq!(goals[0].target_amount, Some(money("3000")));

        let fetched = db.get_goal(id).unwrap().unwrap();
        assert_eq!(fetched.name, "Rainy day fund");
        assert!(db.get_goal(999).unwrap().is_none());

        db.set_goal_status(id, GoalStatus::Achieved).unwrap();
        assert!(db.active_goals(1).unwrap().is_empty());
        assert_eq!(db.list_goals(1).unwrap().len(), 1);
    }

    #[test]
    fn test_action_runs_and_exclusions() {
        let db = Database::in_memory().unwrap();
        db.seed_default_catalog().unwrap();

        let candidates = db.list_candidates(true).unwrap();
        let candidate_id = candidates[0].id;

        let run_id = db.start_action_run(1, candidate_id).unwrap();
        assert_eq!(db.excluded_candidate_ids(1).unwrap(), vec![candidate_id]);

        let run = db.get_action_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(db.get_action_run(999).unwrap().is_none());

        db.set_run_status(run_id, RunStatus::Completed).unwrap();
        let runs = db.list_action_runs(1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert!(runs[0].completed_at.is_some());
        assert_eq!(db.excluded_candidate_ids(1).unwrap(), vec![candidate_id]);

        // Abandoning frees the candidate
        let run2 = db.start_action_run(1, candidates[1].id).unwrap();
        db.set_run_status(run2, RunStatus::Abandoned).unwrap();
        let excluded = db.excluded_candidate_ids(1).unwrap();
        assert!(!excluded.contains(&candidates[1].id));
    }

    #[test]
    fn test_audit_events() {
        let db = Database::in_memory().unwrap();

        db.record_event(1, "detect_run", Some("pattern"), None, Some(r#"{"found":2}"#))
            .unwrap();
        db.record_event(1, "import", None, None, None).unwrap();

        let events = db.recent_events(1, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.event_type == "detect_run"));
    }

    #[test]
    fn test_encrypted_database() {
        use std::fs;

        let test_path = "/tmp/keel_test_encrypted.db";

        // Clean up any existing test file
        let _ = fs::remove_file(test_path);

        // Create an encrypted database
        {
            let db = Database::new_with_key(test_path, Some("test-passphrase")).unwrap();

            db.upsert_account(1, "Test Account", AccountKind::Checking)
                .unwrap();

            let accounts = db.list_accounts(1).unwrap();
            assert_eq!(accounts.len(), 1);
        }

        // Verify we can open it with the same key
        {
            let db = Database::new_with_key(test_path, Some("test-passphrase")).unwrap();
            let accounts = db.list_accounts(1).unwrap();
            assert_eq!(accounts.len(), 1);
        }

        // Verify opening without key fails (file is actually encrypted)
        {
            let result = Database::new_with_key(test_path, None);
            assert!(
                result.is_err(),
                "Should fail to open encrypted db without key"
            );
        }

        // Verify opening with wrong key fails
        {
            let result = Database::new_with_key(test_path, Some("wrong-passphrase"));
            assert!(
                result.is_err(),
                "Should fail to open encrypted db with wrong key"
            );
        }

        // Clean up
        let _ = fs::remove_file(test_path);
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let key1 = derive_key("my-secret").unwrap();
        let key2 = derive_key("my-secret").unwrap();
        assert_eq!(key1, key2);

        // Different passphrase = different key
        let key3 = derive_key("other-secret").unwrap();
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_encryption_required_by_default() {
        use std::env;
        use std::fs;

        let test_path = "/tmp/keel_test_encryption_required.db";

        // Clean up any existing test file
        let _ = fs::remove_file(test_path);

        // Ensure KEEL_DB_KEY is not set for this test
        env::remove_var(DB_KEY_ENV);

        // Database::new() should fail without KEEL_DB_KEY
        let result = Database::new(test_path);
        assert!(
            result.is_err(),
            "Database::new() should fail without KEEL_DB_KEY"
        );

        let err_msg = match result {
            Err(e) => e.to_string(),
            Ok(_) => panic!("Expected error"),
        };
        assert!(
            err_msg.contains("encryption required") || err_msg.contains(DB_KEY_ENV),
            "Error should mention encryption requirement: {}",
            err_msg
        );

        // new_unencrypted() should succeed
        let result = Database::new_unencrypted(test_path);
        assert!(result.is_ok(), "new_unencrypted() should succeed");

        // Clean up
        let _ = fs::remove_file(test_path);
    }
}

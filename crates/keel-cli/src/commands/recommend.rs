//! Recommendation ranking command implementation

use std::path::Path;

use anyhow::Result;
use keel_core::recommend::RecommendationEngine;

use super::open_db;

pub fn cmd_recommend(db_path: &Path, user_id: i64, no_encrypt: bool) -> Result<()> {
    println!("🎯 Ranking next actions...");

    let db = open_db(db_path, no_encrypt)?;
    let engine = RecommendationEngine::new(&db);
    let recommendations = engine.rank(user_id)?;

    if recommendations.is_empty() {
        println!();
        println!("Nothing to recommend yet. The ranker needs signals to work with:");
        println!("  1. Seed the catalog: keel init");
        println!("  2. Import transactions: keel import --file statement.csv");
        println!("  3. Detect recurring charges: keel detect");
        println!("  4. Declare a goal: keel goals add reduce_spending \"Spend less\"");
        return Ok(());
    }

    println!();
    println!("🎯 Recommended Next Steps");
    println!("   ─────────────────────────────────────────────────────────────");

    for rec in &recommendations {
        let candidate = db.get_candidate(rec.candidate_id)?;
        let (title, key) = match &candidate {
            Some(c) => (c.title.clone(), c.key.clone()),
            None => (
                format!("candidate {}", rec.candidate_id),
                rec.candidate_id.to_string(),
            ),
        };
        let quick_mark = if rec.quick_win { " ⚡ quick win" } else { "" };

        println!();
        println!("   {}. {}{}", rec.rank, title, quick_mark);
        println!("      {}", rec.explanation);
        println!(
            "      confidence: {} | start with: keel runs start {}",
            rec.confidence.as_str(),
            key
        );
    }

    println!();

    Ok(())
}

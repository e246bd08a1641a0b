//! Goal, catalog, and action run command implementations

use anyhow::{Context, Result};
use keel_core::db::Database;
use keel_core::models::{GoalStatus, RunStatus};
use rust_decimal::Decimal;

use super::{fmt_money, truncate};

pub fn cmd_goals_list(db: &Database, user_id: i64) -> Result<()> {
    let goals = db.list_goals(user_id)?;

    if goals.is_empty() {
        println!("No goals yet. Add one with:");
        println!("  keel goals add emergency_fund \"3-month emergency fund\" --target 5000");
        return Ok(());
    }

    println!();
    println!("🎯 Goals");
    println!("   ─────────────────────────────────────────────────────────────");

    for goal in goals {
        let status_icon = match goal.status {
            GoalStatus::Active => "🟢",
            GoalStatus::Achieved => "🏁",
            GoalStatus::Abandoned => "❌",
        };
        let target = goal
            .target_amount
            .map(|t| format!(" target {}", fmt_money(t)))
            .unwrap_or_default();

        println!(
            "   {} [{}] {:32} ({}){}",
            status_icon,
            goal.id,
            truncate(&goal.name, 32),
            goal.kind,
            target
        );
    }

    Ok(())
}

pub fn cmd_goals_add(
    db: &Database,
    user_id: i64,
    kind: &str,
    name: &str,
    target: Option<&str>,
) -> Result<()> {
    let target = target
        .map(|s| s.parse::<Decimal>())
        .transpose()
        .context("Invalid --target (use a decimal like 5000)")?;

    let id = db.add_goal(user_id, kind, name, target)?;

    println!("✅ Goal added (ID: {})", id);

    // An unmapped kind never boosts anything, which usually means a typo
    let map = db.goal_category_map()?;
    if !map.is_empty() && !map.iter().any(|(k, _)| k == kind) {
        let mut known: Vec<&str> = map.iter().map(|(k, _)| k.as_str()).collect();
        known.dedup();
        println!(
            "   ⚠️  Kind '{}' maps to no catalog actions (known: {})",
            kind,
            known.join(", ")
        );
    } else {
        println!("   Goal-aligned actions now rank higher in 'keel recommend'");
    }

    Ok(())
}

pub fn cmd_goals_achieve(db: &Database, goal_id: i64) -> Result<()> {
    let goal = db
        .get_goal(goal_id)?
        .ok_or_else(|| anyhow::anyhow!("No goal with ID {}", goal_id))?;

    db.set_goal_status(goal_id, GoalStatus::Achieved)?;

    println!("🏁 \"{}\" marked achieved. Nice work!", goal.name);

    Ok(())
}

pub fn cmd_catalog_list(db: &Database) -> Result<()> {
    let candidates = db.list_candidates(false)?;

    if candidates.is_empty() {
        println!("Action catalog is empty. Seed it with:");
        println!("  keel catalog seed");
        return Ok(());
    }

    println!();
    println!("📚 Action Catalog");
    println!("   ─────────────────────────────────────────────────────────────");

    for c in candidates {
        let inactive_mark = if c.active { "" } else { " (inactive)" };

        println!(
            "   [{}] {:28} {:19} {:9} {}-{}/mo ~{}min{}",
            c.id,
            truncate(&c.key, 28),
            c.category.as_str(),
            c.difficulty.as_str(),
            fmt_money(c.min_savings),
            fmt_money(c.max_savings),
            c.est_minutes,
            inactive_mark
        );
    }

    Ok(())
}

pub fn cmd_catalog_seed(db: &Database) -> Result<()> {
    let seeded = db.seed_default_catalog()?;

    if seeded > 0 {
        println!("✅ Seeded {} catalog actions", seeded);
    } else {
        println!("Action catalog already seeded.");
    }

    Ok(())
}

pub fn cmd_runs_list(db: &Database, user_id: i64) -> Result<()> {
    let runs = db.list_action_runs(user_id)?;

    if runs.is_empty() {
        println!("No action runs yet. Start one with:");
        println!("  keel runs start trim_dining_out");
        return Ok(());
    }

    println!();
    println!("🏃 Action Runs");
    println!("   ─────────────────────────────────────────────────────────────");

    for run in runs {
        let status_icon = match run.status {
            RunStatus::InProgress => "🔵",
            RunStatus::Paused => "⏸️",
            RunStatus::Completed => "✅",
            RunStatus::Abandoned => "❌",
        };
        let title = db
            .get_candidate(run.candidate_id)?
            .map(|c| c.title)
            .unwrap_or_else(|| format!("candidate {}", run.candidate_id));

        println!(
            "   {} [{}] {:32} {:11} started {}",
            status_icon,
            run.id,
            truncate(&title, 32),
            run.status.as_str(),
            run.started_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn cmd_runs_start(db: &Database, user_id: i64, candidate: &str) -> Result<()> {
    // Accept a numeric ID or a catalog key
    let found = match candidate.parse::<i64>() {
        Ok(id) => db.get_candidate(id)?,
        Err(_) => db.get_candidate_by_key(candidate)?,
    };
    let found =
        found.ok_or_else(|| anyhow::anyhow!("No catalog action matches '{}'", candidate))?;

    let run_id = db.start_action_run(user_id, found.id)?;

    println!("🏃 Started: {} (run ID: {})", found.title, run_id);
    println!("   Estimated effort: ~{} minutes", found.est_minutes);
    println!("   While in progress it stays out of 'keel recommend'");
    println!("   Finish with: keel runs complete {}", run_id);

    Ok(())
}

pub fn cmd_runs_complete(db: &Database, run_id: i64) -> Result<()> {
    db.get_action_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("No run with ID {}", run_id))?;

    db.set_run_status(run_id, RunStatus::Completed)?;

    println!("✅ Run {} completed. Nice work!", run_id);

    Ok(())
}

pub fn cmd_runs_pause(db: &Database, run_id: i64) -> Result<()> {
    db.get_action_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("No run with ID {}", run_id))?;

    db.set_run_status(run_id, RunStatus::Paused)?;

    println!("⏸️  Run {} paused (it still blocks re-recommendation)", run_id);

    Ok(())
}

pub fn cmd_runs_abandon(db: &Database, run_id: i64) -> Result<()> {
    db.get_action_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("No run with ID {}", run_id))?;

    db.set_run_status(run_id, RunStatus::Abandoned)?;

    println!("❌ Run {} abandoned. Its action can be recommended again.", run_id);

    Ok(())
}

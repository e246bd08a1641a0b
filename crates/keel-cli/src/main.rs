//! Keel CLI - Personal finance coaching pipeline
//!
//! Usage:
//!   keel init                  Initialize database and seed the action catalog
//!   keel import --file CSV     Import transactions
//!   keel detect                Detect recurring charges
//!   keel forecast              Compute a 30-day cash-flow forecast
//!   keel recommend             Rank the next actions worth taking

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.user, cli.no_encrypt),
        Commands::Import { file, account } => {
            commands::cmd_import(&cli.db, cli.user, &file, account, cli.no_encrypt)
        }
        Commands::Accounts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(AccountsAction::List) => commands::cmd_accounts_list(&db, cli.user),
                Some(AccountsAction::Add { name, kind }) => {
                    commands::cmd_accounts_add(&db, cli.user, &name, &kind)
                }
                Some(AccountsAction::SetBalance {
                    id,
                    current,
                    available,
                }) => commands::cmd_accounts_set_balance(&db, id, &current, available.as_deref()),
            }
        }
        Commands::Bills { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                BillsAction::Add {
                    name,
                    amount,
                    frequency,
                    due,
                    category,
                    essential,
                } => commands::cmd_bills_add(
                    &db,
                    cli.user,
                    &name,
                    &amount,
                    &frequency,
                    &due,
                    category.as_deref(),
                    essential,
                ),
                BillsAction::List => commands::cmd_bills_list(&db, cli.user),
            }
        }
        Commands::Patterns { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(PatternsAction::List) => commands::cmd_patterns_list(&db, cli.user),
                Some(PatternsAction::Status { id, status }) => {
                    commands::cmd_patterns_status(&db, id, &status)
                }
                Some(PatternsAction::Essential { id, off }) => {
                    commands::cmd_patterns_essential(&db, id, !off)
                }
            }
        }
        Commands::Detect => commands::cmd_detect(&cli.db, cli.user, cli.no_encrypt),
        Commands::Forecast { history } => {
            commands::cmd_forecast(&cli.db, cli.user, history, cli.no_encrypt)
        }
        Commands::Recommend => commands::cmd_recommend(&cli.db, cli.user, cli.no_encrypt),
        Commands::Goals { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(GoalsAction::List) => commands::cmd_goals_list(&db, cli.user),
                Some(GoalsAction::Add { kind, name, target }) => {
                    commands::cmd_goals_add(&db, cli.user, &kind, &name, target.as_deref())
                }
                Some(GoalsAction::Achieve { id }) => commands::cmd_goals_achieve(&db, id),
            }
        }
        Commands::Catalog { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(CatalogAction::List) => commands::cmd_catalog_list(&db),
                Some(CatalogAction::Seed) => commands::cmd_catalog_seed(&db),
            }
        }
        Commands::Runs { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(RunsAction::List) => commands::cmd_runs_list(&db, cli.user),
                Some(RunsAction::Start { candidate }) => {
                    commands::cmd_runs_start(&db, cli.user, &candidate)
                }
                Some(RunsAction::Complete { id }) => commands::cmd_runs_complete(&db, id),
                Some(RunsAction::Pause { id }) => commands::cmd_runs_pause(&db, id),
                Some(RunsAction::Abandon { id }) => commands::cmd_runs_abandon(&db, id),
            }
        }
    }
}

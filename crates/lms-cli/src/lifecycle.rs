//! # Lifecycle Subcommand
//!
//! Runs one lifecycle policy pass over every non-terminal license:
//! renewal reminders, expiry marking, auto-suspension.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use lms_policy::{LoggingNotifier, PolicyEngine, PolicyReport};

use crate::persist;

/// Arguments for the `lms lifecycle` subcommand.
#[derive(Args, Debug)]
pub struct LifecycleArgs {
    /// Evaluate as of this RFC 3339 instant instead of now.
    #[arg(long)]
    pub at: Option<String>,

    /// Run the pass but do not write results back to the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Database URL; defaults to `LMS_DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,
}

/// Run the `lms lifecycle` subcommand.
pub async fn run_lifecycle(args: &LifecycleArgs) -> Result<u8> {
    let now: DateTime<Utc> = match &args.at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("parsing --at {raw:?}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let pool = persist::connect(args.database_url.as_deref()).await?;
    let store = persist::load_store(&pool).await?;
    let engine = PolicyEngine::new(store.clone(), Arc::new(LoggingNotifier));

    let report = engine.run_pass(now);

    if args.dry_run {
        println!("dry run: results not written back");
    } else {
        persist::save_store(&pool, &store).await?;
    }
    print_report(&report);

    Ok(if report.failures.is_empty() { 0 } else { 2 })
}

fn print_report(report: &PolicyReport) {
    println!(
        "lifecycle pass finished: {} evaluated — {} reminder(s), {} expiring, {} expired, {} suspended",
        report.evaluated,
        report.reminders_sent,
        report.marked_expiring,
        report.marked_expired,
        report.suspended
    );
    for (id, error) in &report.failures {
        println!("  failed {id}: {error}");
    }
}

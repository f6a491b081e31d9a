//! # lms CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lms_cli::audit::{run_audit, AuditArgs};
use lms_cli::lifecycle::{run_lifecycle, LifecycleArgs};
use lms_cli::sync::{run_sync, SyncArgs};

/// License Management Stack CLI
///
/// Operational jobs for the license store: provider reconciliation,
/// lifecycle policy passes, and audit chain verification.
#[derive(Parser, Debug)]
#[command(name = "lms", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation batch against the provider feed.
    Sync(SyncArgs),

    /// Run one lifecycle policy pass (reminders, expiry, suspension).
    Lifecycle(LifecycleArgs),

    /// Audit chain inspection (verify, show).
    Audit(AuditArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Sync(args) => run_sync(&args).await,
        Commands::Lifecycle(args) => run_lifecycle(&args).await,
        Commands::Audit(args) => run_audit(&args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

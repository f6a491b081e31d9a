//! # Sync Subcommand
//!
//! Runs one reconciliation batch: fetch the provider feed (or read a
//! record file), sanitize, identify, merge, and report the outcome.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use lms_provider::{ProviderClient, ProviderConfig, ProviderRecord};
use lms_recon::{ReconEngine, ReconReport};

use crate::persist;

/// Arguments for the `lms sync` subcommand.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Read provider records from a JSON file instead of the feed.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Per-page fetch timeout in seconds.
    #[arg(long, default_value_t = 60)]
    pub page_timeout_secs: u64,

    /// Run the merge but do not write results back to the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Database URL; defaults to `LMS_DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,
}

/// Run the `lms sync` subcommand.
pub async fn run_sync(args: &SyncArgs) -> Result<u8> {
    let pool = persist::connect(args.database_url.as_deref()).await?;
    let store = persist::load_store(&pool).await?;
    let engine = ReconEngine::new(store.clone());
    let now = Utc::now();

    let report = match &args.input {
        Some(path) => {
            let records = read_records(path)?;
            engine.run(&records, now)?
        }
        None => {
            let config = ProviderConfig::from_env().context("provider configuration")?;
            let client = ProviderClient::new(config)?;
            engine
                .run_from_provider(&client, Duration::from_secs(args.page_timeout_secs), now)
                .await?
        }
    };

    if args.dry_run {
        println!("dry run: results not written back");
    } else {
        persist::save_store(&pool, &store).await?;
    }
    print_report(&report);

    Ok(if report.failed > 0 { 2 } else { 0 })
}

/// Read a batch of provider records from a JSON file.
fn read_records(path: &std::path::Path) -> Result<Vec<ProviderRecord>> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_report(report: &ReconReport) {
    println!(
        "sync finished: {} record(s) — {} created, {} merged, {} unchanged, {} failed",
        report.total, report.created, report.merged, report.unchanged, report.failed
    );
    for failure in &report.errors {
        println!("  failed {}: {}", failure.external_id, failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn record_file_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "e1", "appid": "app-1", "smsBalance": "18.5"}}]"#
        )
        .unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "e1");
        assert_eq!(records[0].appid.as_deref(), Some("app-1"));
    }

    #[test]
    fn malformed_record_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_records(file.path()).is_err());
    }
}

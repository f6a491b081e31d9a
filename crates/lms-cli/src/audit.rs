//! # Audit Subcommand
//!
//! Inspects the persisted audit event chain.

use anyhow::Result;
use clap::{Args, Subcommand};

use lms_store::pg;

use crate::persist;

/// Arguments for the `lms audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Verify hash continuity across the whole audit chain.
    Verify {
        /// Database URL; defaults to `LMS_DATABASE_URL`.
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Print the events recorded for one entity.
    Show {
        /// Entity type, e.g. `license` or `assignment`.
        #[arg(long)]
        entity_type: String,
        /// Entity identifier.
        #[arg(long)]
        entity_id: String,
        /// Database URL; defaults to `LMS_DATABASE_URL`.
        #[arg(long)]
        database_url: Option<String>,
    },
}

/// Run the `lms audit` subcommand.
pub async fn run_audit(args: &AuditArgs) -> Result<u8> {
    match &args.command {
        AuditCommand::Verify { database_url } => {
            let pool = persist::connect(database_url.as_deref()).await?;
            let integrity = pg::audit::verify_chain_integrity(&pool).await?;
            println!(
                "audit chain: {} event(s), {} broken link(s) — {}",
                integrity.total_events,
                integrity.broken_links,
                if integrity.chain_valid { "VALID" } else { "BROKEN" }
            );
            Ok(if integrity.chain_valid { 0 } else { 2 })
        }
        AuditCommand::Show {
            entity_type,
            entity_id,
            database_url,
        } => {
            let pool = persist::connect(database_url.as_deref()).await?;
            let events = pg::audit::events_for_entity(&pool, entity_type, entity_id).await?;
            if events.is_empty() {
                println!("no events for {entity_type} {entity_id}");
                return Ok(0);
            }
            for event in events {
                println!(
                    "{}  {}  actor={}  {}",
                    event.created_at.to_rfc3339(),
                    event.event_type,
                    event
                        .actor_id
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "system".to_string()),
                    event.metadata
                );
            }
            Ok(0)
        }
    }
}

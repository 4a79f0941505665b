pub mod daemon;
pub mod init;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use hubmirror_sync::SyncRunSummary;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

#[derive(Tabled)]
struct CollectionRow {
    #[tabled(rename = "collection")]
    collection: String,
    #[tabled(rename = "identity")]
    identity: String,
    #[tabled(rename = "indexed")]
    indexed: usize,
    #[tabled(rename = "fetched")]
    fetched: usize,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "updated")]
    updated: String,
    #[tabled(rename = "failed")]
    failed: usize,
}

/// Per-collection table followed by the error list.
pub(crate) fn print_summary(summary: &SyncRunSummary) {
    let rows: Vec<CollectionRow> = summary
        .collections
        .iter()
        .map(|c| {
            let (created, updated) = if summary.dry_run {
                (
                    format!("({})", c.planned_creates),
                    format!("({})", c.planned_updates),
                )
            } else {
                (c.created.to_string(), c.updated.to_string())
            };
            CollectionRow {
                collection: c.collection.clone(),
                identity: c.identity.to_string(),
                indexed: c.indexed,
                fetched: c.fetched,
                created,
                updated,
                failed: c.failed,
            }
        })
        .collect();

    if rows.is_empty() {
        println!("No collections synced.");
    } else {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if summary.dry_run {
        println!(
            "{} would create {}, would update {}",
            "[dry-run]".yellow(),
            summary.planned_creates(),
            summary.planned_updates()
        );
    } else {
        println!(
            "{} created {}, updated {}",
            "✓".green(),
            summary.created,
            summary.updated
        );
    }

    if !summary.errors.is_empty() {
        println!("{}", format!("{} error(s):", summary.errors.len()).red());
        for err in &summary.errors {
            println!(
                "  {} [{} {}] {}: {}",
                "✗".red(),
                err.collection,
                err.kind,
                err.subject,
                err.message
            );
        }
    }
}

pub(crate) fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 60 * 60 {
        return format!("{}m ago", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h ago", seconds / (60 * 60));
    }
    format!("{}d ago", seconds / (60 * 60 * 24))
}

//! `hubmirror status`: outcome of the most recent sync run.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hubmirror_sync::run_store::{self, RunOutcome, RunRecord};

use super::{format_age, home_dir, print_summary};

/// Arguments for `hubmirror status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit the run record as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let record = run_store::load_at(&home).with_context(|| {
            format!(
                "failed to read {}",
                run_store::store_path_at(&home).display()
            )
        })?;

        if self.json {
            let json = serde_json::to_string_pretty(&serde_json::json!({ "last_run": record }))
                .context("failed to serialize run record")?;
            println!("{json}");
            return Ok(());
        }

        match record {
            None => println!("No sync run recorded yet. Run `hubmirror sync` first."),
            Some(record) => print_record(&record),
        }
        Ok(())
    }
}

fn print_record(record: &RunRecord) {
    let when = format!(
        "{} ({})",
        record.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_age(record.recorded_at)
    );
    match &record.outcome {
        RunOutcome::Succeeded { summary } => {
            let label = if summary.is_clean() {
                "succeeded".green()
            } else {
                "succeeded with errors".yellow()
            };
            println!("Last run {label} at {when}");
            print_summary(summary);
        }
        RunOutcome::Failed { error } => {
            println!("Last run {} at {when}", "failed".red());
            println!("  {error}");
        }
    }
}

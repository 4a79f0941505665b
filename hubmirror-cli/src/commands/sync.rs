//! `hubmirror sync`: one reconciliation pass over every configured collection.

use anyhow::{bail, Context, Result};
use clap::Args;

use hubmirror_daemon::init_tracing;
use hubmirror_sync::pipeline::{self, RunOptions};

use super::{home_dir, print_summary};

/// Arguments for `hubmirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Read both sides and report planned writes without touching Notion.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero when any page-level failure was recorded.
    #[arg(long)]
    pub strict: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        init_tracing();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let summary = runtime
            .block_on(pipeline::run(
                &home,
                RunOptions {
                    dry_run: self.dry_run,
                },
            ))
            .context("sync failed")?;

        if self.json {
            let json =
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
            println!("{json}");
        } else {
            print_summary(&summary);
        }

        if self.strict && !summary.is_clean() {
            bail!("{} page-level failure(s) recorded", summary.errors.len());
        }
        Ok(())
    }
}

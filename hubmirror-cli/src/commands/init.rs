//! `hubmirror init --issues-db <id> [--prs-db <id>] ...`

use anyhow::{bail, Context, Result};
use clap::Args;

use hubmirror_core::config::{self, ENV_GITHUB_KEY, ENV_NOTION_KEY};
use hubmirror_core::{CollectionConfig, Collections, Config, RepoRef, SourceMode};

use super::super::SourceModeArg;
use super::home_dir;

/// Write a config file for one or both collections.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Notion database receiving issues.
    #[arg(long, value_name = "ID", required_unless_present = "prs_db")]
    pub issues_db: Option<String>,

    /// Notion database receiving pull requests.
    #[arg(long, value_name = "ID")]
    pub prs_db: Option<String>,

    /// Where issues come from: assigned | owned | repository.
    #[arg(long, value_name = "SOURCE", default_value = "assigned")]
    pub issues_source: SourceModeArg,

    /// Where pull requests come from: assigned | owned | repository.
    #[arg(long, value_name = "SOURCE", default_value = "owned")]
    pub prs_source: SourceModeArg,

    /// Repository for `repository` sources, as owner/name.
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<RepoRef>,

    /// Pages created or updated concurrently per batch.
    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let path = config::config_path_at(&home);
        if path.exists() && !self.force {
            println!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            );
            return Ok(());
        }

        let issues = self
            .issues_db
            .as_deref()
            .map(|db| collection(db, self.issues_source, self.repo.as_ref()))
            .transpose()?;
        let pull_requests = self
            .prs_db
            .as_deref()
            .map(|db| collection(db, self.prs_source, self.repo.as_ref()))
            .transpose()?;

        let config = Config {
            batch_size: self.batch_size,
            collections: Collections {
                issues,
                pull_requests,
            },
            ..Config::default()
        };
        let warnings = config.validate().context("invalid configuration")?;
        for warning in &warnings {
            println!("warning: {warning}");
        }

        let saved = config::save_at(&home, &config)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("✓ Wrote {}", saved.display());
        for (kind, collection) in config.collections() {
            println!(
                "  {} → database {} ({} source, {} identity)",
                kind.collection(),
                collection.database_id,
                collection.source,
                collection.identity
            );
        }
        println!("  Set {ENV_GITHUB_KEY} and {ENV_NOTION_KEY} before running `hubmirror sync`.");
        Ok(())
    }
}

fn collection(
    database_id: &str,
    source: SourceModeArg,
    repo: Option<&RepoRef>,
) -> Result<CollectionConfig> {
    let mode = match source {
        SourceModeArg::Assigned => SourceMode::Assigned,
        SourceModeArg::Owned => SourceMode::Owned,
        SourceModeArg::Repository => match repo {
            Some(repo) => SourceMode::repository(repo),
            None => bail!("--repo OWNER/NAME is required for a repository source"),
        },
    };
    Ok(CollectionConfig::new(database_id.trim(), mode))
}

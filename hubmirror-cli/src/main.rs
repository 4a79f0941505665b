//! hubmirror: mirror GitHub issues and pull requests into Notion databases.
//!
//! # Usage
//!
//! ```text
//! hubmirror init --issues-db <id> [--prs-db <id>] [--issues-source assigned|owned|repository]
//!                [--prs-source ...] [--repo owner/name] [--batch-size N] [--force]
//! hubmirror sync [--dry-run] [--json] [--strict]
//! hubmirror status [--json]
//! hubmirror daemon start [--interval-secs N]
//! ```

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, init::InitArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hubmirror",
    version,
    about = "Mirror GitHub issues and pull requests into Notion databases",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.hubmirror/config.yaml.
    Init(InitArgs),

    /// Run one reconciliation pass over every configured collection.
    Sync(SyncArgs),

    /// Show the outcome of the most recent sync run.
    Status(StatusArgs),

    /// Run sync on a fixed interval in the foreground.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Source mode argument
// ---------------------------------------------------------------------------

/// Source selector as typed on the command line. `repository` needs `--repo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceModeArg {
    Assigned,
    Owned,
    Repository,
}

impl FromStr for SourceModeArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assigned" => Ok(Self::Assigned),
            "owned" => Ok(Self::Owned),
            "repository" | "repo" => Ok(Self::Repository),
            other => Err(format!(
                "unknown source '{other}'; expected: assigned, owned, repository"
            )),
        }
    }
}

impl fmt::Display for SourceModeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned => write!(f, "assigned"),
            Self::Owned => write!(f, "owned"),
            Self::Repository => write!(f, "repository"),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

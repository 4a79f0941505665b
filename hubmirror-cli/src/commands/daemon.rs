//! `hubmirror daemon`: periodic sync in the foreground.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use hubmirror_daemon::paths::DEFAULT_INTERVAL;
use hubmirror_daemon::start_blocking;

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Sync now, then once per interval until ctrl-c.
    Start(DaemonStartArgs),
}

#[derive(Args, Debug)]
pub struct DaemonStartArgs {
    /// Seconds between the start of consecutive runs.
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs())]
    pub interval_secs: u64,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start(args) => {
            start_blocking(&home, Duration::from_secs(args.interval_secs))
                .context("daemon exited with error")?;
        }
    }
    Ok(())
}

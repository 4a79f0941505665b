use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use hubmirror_sync::error::error_chain;
use hubmirror_sync::pipeline::{self, RunOptions};
use hubmirror_sync::{SyncError, SyncRunSummary};

use crate::error::{io_err, DaemonError};
use crate::paths::{last_run_path, runs_dir, MIN_INTERVAL};

/// Counters of one scheduler lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(home: &Path, interval: Duration) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), interval))
}

/// Run the pipeline every `interval` until ctrl-c.
///
/// The first run starts immediately. A run in progress when ctrl-c arrives
/// is allowed to finish.
pub async fn run(home: PathBuf, interval: Duration) -> Result<(), DaemonError> {
    if interval < MIN_INTERVAL {
        return Err(DaemonError::IntervalTooShort {
            min_secs: MIN_INTERVAL.as_secs(),
            got_secs: interval.as_secs(),
        });
    }
    ensure_runtime_dirs(&home)?;
    tracing::info!(
        interval_secs = interval.as_secs(),
        record = %last_run_path(&home).display(),
        "daemon started"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Signal(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let stats = run_schedule(
        interval,
        || pipeline::run(&home, RunOptions::default()),
        shutdown_tx.subscribe(),
    )
    .await;
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;

    tracing::info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "daemon stopped"
    );
    Ok(())
}

/// Call `job` once per `period` until `shutdown` fires.
///
/// Runs never overlap: a tick that comes due while a run is in progress is
/// delivered once when it ends, and further missed ticks are skipped. A
/// failed run is logged and the schedule continues.
pub async fn run_schedule<F, Fut>(
    period: Duration,
    mut job: F,
    mut shutdown: broadcast::Receiver<()>,
) -> ScheduleStats
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SyncRunSummary, SyncError>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = ScheduleStats::default();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = interval.tick() => {
                let started = Instant::now();
                match job().await {
                    Ok(summary) => {
                        stats.succeeded += 1;
                        tracing::info!(
                            created = summary.created,
                            updated = summary.updated,
                            errors = summary.errors.len(),
                            duration_ms = started.elapsed().as_millis() as u64,
                            "scheduled sync finished"
                        );
                    }
                    Err(err) => {
                        stats.failed += 1;
                        tracing::error!(error = %error_chain(&err), "scheduled sync failed");
                    }
                }
            }
        }
    }
    stats
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let dir = runs_dir(home);
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            message: err.to_string(),
        }),
    }
}

/// Install the `tracing` subscriber on stderr: `RUST_LOG` if set, `info`
/// otherwise. Stdout stays free for command output.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

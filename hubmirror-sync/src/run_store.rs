//! Run store: the outcome of the most recent sync run.
//!
//! Persists a [`RunRecord`] JSON document at
//! `<home>/.hubmirror/runs/last-run.json`, written with the same atomic
//! `.tmp` + rename pattern as the config file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hubmirror_core::config::root_dir_at;

use crate::error::{error_chain, io_err, SyncError};
use crate::summary::SyncRunSummary;

/// How the recorded run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The run completed; per-item failures are inside the summary.
    Succeeded { summary: SyncRunSummary },
    /// The run aborted before completing.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunRecord {
    pub fn from_result(result: &Result<SyncRunSummary, SyncError>) -> Self {
        let outcome = match result {
            Ok(summary) => RunOutcome::Succeeded {
                summary: summary.clone(),
            },
            Err(err) => RunOutcome::Failed {
                error: error_chain(err),
            },
        };
        Self {
            recorded_at: Utc::now(),
            outcome,
        }
    }
}

/// `~/.hubmirror/runs/last-run.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    root_dir_at(home).join("runs").join("last-run.json")
}

/// Load the last run record. `None` when no run has been recorded yet.
pub fn load_at(home: &Path) -> Result<Option<RunRecord>, SyncError> {
    let path = store_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save `record` atomically, replacing any previous record.
pub fn save_at(home: &Path, record: &RunRecord) -> Result<PathBuf, SyncError> {
    let path = store_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid run store path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// Record the outcome of a run. Failures to record are logged, never
/// propagated: the run itself already finished.
pub fn record_at(home: &Path, result: &Result<SyncRunSummary, SyncError>) {
    let record = RunRecord::from_result(result);
    match save_at(home, &record) {
        Ok(path) => tracing::debug!(path = %path.display(), "run recorded"),
        Err(err) => tracing::warn!(error = %err, "could not record run outcome"),
    }
}

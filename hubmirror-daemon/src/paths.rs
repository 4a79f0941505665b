use std::path::{Path, PathBuf};
use std::time::Duration;

use hubmirror_core::config::root_dir_at;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);

pub fn hubmirror_root(home: &Path) -> PathBuf {
    root_dir_at(home)
}

pub fn runs_dir(home: &Path) -> PathBuf {
    hubmirror_root(home).join("runs")
}

pub fn last_run_path(home: &Path) -> PathBuf {
    hubmirror_sync::run_store::store_path_at(home)
}

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use hubmirror_core::config::{self, load_at};
use hubmirror_core::SourceMode;
use hubmirror_sync::run_store::{self, RunOutcome, RunRecord};
use hubmirror_sync::{CollectionSummary, SyncRunSummary};

const SCRUBBED_VARS: &[&str] = &[
    config::ENV_ISSUES_DATABASE,
    config::ENV_PRS_DATABASE,
    config::ENV_BATCH_SIZE,
    config::ENV_GITHUB_KEY,
    config::ENV_GITHUB_TOKEN,
    config::ENV_NOTION_KEY,
];

fn hubmirror_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hubmirror"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    for var in SCRUBBED_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn init_writes_config_and_keeps_it_without_force() {
    let home = TempDir::new().expect("home");

    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "db-issues", "--prs-db", "db-prs"])
        .assert()
        .success()
        .stdout(contains("Wrote"))
        .stdout(contains("GITHUB_KEY"));

    let written = load_at(home.path()).expect("load");
    let issues = written.collections.issues.as_ref().expect("issues");
    assert_eq!(issues.database_id.0, "db-issues");
    assert_eq!(issues.source, SourceMode::Assigned);
    let prs = written.collections.pull_requests.as_ref().expect("prs");
    assert_eq!(prs.source, SourceMode::Owned);
    assert_eq!(written.batch_size, config::DEFAULT_BATCH_SIZE);

    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "other"])
        .assert()
        .success()
        .stdout(contains("--force"));
    assert_eq!(load_at(home.path()).expect("reload"), written);

    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "other", "--batch-size", "10", "--force"])
        .assert()
        .success();
    let replaced = load_at(home.path()).expect("reload");
    assert_eq!(replaced.batch_size, 10);
    assert!(replaced.collections.pull_requests.is_none());
}

#[test]
fn init_repository_source_needs_repo() {
    let home = TempDir::new().expect("home");

    hubmirror_cmd(home.path())
        .args(["init", "--prs-db", "db", "--prs-source", "repository"])
        .assert()
        .failure()
        .stderr(contains("--repo"));
    assert!(!config::config_path_at(home.path()).exists());

    hubmirror_cmd(home.path())
        .args([
            "init",
            "--prs-db",
            "db",
            "--prs-source",
            "repository",
            "--repo",
            "octo/widgets",
        ])
        .assert()
        .success();
    let written = load_at(home.path()).expect("load");
    assert_eq!(
        written.collections.pull_requests.expect("prs").source,
        SourceMode::Repository {
            owner: "octo".into(),
            name: "widgets".into()
        }
    );
}

#[test]
fn init_rejects_out_of_range_batch_size() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "db", "--batch-size", "0"])
        .assert()
        .failure()
        .stderr(contains("batch_size"));
}

#[test]
fn init_requires_a_database() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path()).arg("init").assert().failure();
}

#[test]
fn status_without_record() {
    let home = TempDir::new().expect("home");

    hubmirror_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No sync run recorded yet"));

    let output = hubmirror_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert!(json["last_run"].is_null());
}

#[test]
fn status_shows_recorded_summary() {
    let home = TempDir::new().expect("home");
    let mut summary = SyncRunSummary::new(false);
    summary.push(
        CollectionSummary {
            collection: "issues".into(),
            fetched: 4,
            created: 3,
            updated: 1,
            ..CollectionSummary::default()
        },
        vec![],
    );
    summary.finish();
    run_store::save_at(home.path(), &RunRecord::from_result(&Ok(summary))).expect("save");

    hubmirror_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("succeeded"))
        .stdout(contains("issues"))
        .stdout(contains("created 3, updated 1"));

    let output = hubmirror_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["last_run"]["outcome"], "succeeded");
    assert_eq!(json["last_run"]["summary"]["created"], 3);
}

#[test]
fn sync_without_config_fails_and_is_recorded() {
    let home = TempDir::new().expect("home");

    hubmirror_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("sync failed"))
        .stderr(contains("hubmirror init"));

    let record = run_store::load_at(home.path())
        .expect("load")
        .expect("record");
    assert!(matches!(record.outcome, RunOutcome::Failed { .. }));

    hubmirror_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("failed"));
}

#[test]
fn sync_without_credentials_names_the_variable() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "db"])
        .assert()
        .success();

    hubmirror_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("GITHUB_KEY"));
}

#[test]
fn dry_run_failure_leaves_no_record() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .failure();
    assert!(!run_store::store_path_at(home.path()).exists());
}

#[test]
fn daemon_rejects_short_interval() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path())
        .args(["daemon", "start", "--interval-secs", "1"])
        .assert()
        .failure()
        .stderr(contains("at least"));
    assert!(fs::read_dir(home.path()).expect("read home").next().is_none());
}

#[test]
fn unknown_source_mode_is_a_usage_error() {
    let home = TempDir::new().expect("home");
    hubmirror_cmd(home.path())
        .args(["init", "--issues-db", "db", "--issues-source", "starred"])
        .assert()
        .failure()
        .stderr(contains("unknown source").and(contains("assigned")));
}

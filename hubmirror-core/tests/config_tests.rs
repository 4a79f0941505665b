//! Config error-message, atomic-write-safety and validation tests.

use assert_fs::prelude::*;
use hubmirror_core::{
    config::{self, DEFAULT_BATCH_SIZE},
    CollectionConfig, Collections, Config, ConfigError, IdentityStrategy, SourceMode,
};
use predicates::prelude::*;
use rstest::rstest;
use std::fs;

fn with_issues(source: SourceMode, identity: IdentityStrategy) -> Config {
    Config {
        collections: Collections {
            issues: Some(CollectionConfig {
                database_id: "db-issues".into(),
                source,
                identity,
            }),
            pull_requests: None,
        },
        ..Config::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_mentions_init() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("hubmirror init"));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".hubmirror/config.yaml")
        .write_str("batch_size: [unclosed\n  - : :")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_unknown_source_mode_is_a_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".hubmirror/config.yaml")
        .write_str("collections:\n  issues:\n    database_id: x\n    source:\n      mode: starred\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_creates_file_and_no_tmp() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &with_issues(SourceMode::Assigned, IdentityStrategy::Url))
        .expect("save");

    home.child(".hubmirror/config.yaml")
        .assert(predicate::path::exists());
    home.child(".hubmirror/config.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn stale_tmp_does_not_affect_load() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = with_issues(SourceMode::Owned, IdentityStrategy::Url);
    config::save_at(home.path(), &config).expect("save");

    // Simulate a crash between write and rename.
    let tmp = config::config_path_at(home.path()).with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write tmp");

    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn saved_yaml_never_contains_tokens() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &with_issues(SourceMode::Assigned, IdentityStrategy::Url))
        .expect("save");
    home.child(".hubmirror/config.yaml")
        .assert(predicate::str::contains("token").not());
}

// ---------------------------------------------------------------------------
// 3. Validation
// ---------------------------------------------------------------------------

#[rstest]
#[case(SourceMode::Assigned, IdentityStrategy::Number, 1)]
#[case(SourceMode::Owned, IdentityStrategy::Number, 1)]
#[case(SourceMode::Repository { owner: "o".into(), name: "r".into() }, IdentityStrategy::Number, 0)]
#[case(SourceMode::Owned, IdentityStrategy::Url, 0)]
fn number_identity_warns_only_across_repositories(
    #[case] source: SourceMode,
    #[case] identity: IdentityStrategy,
    #[case] expected_warnings: usize,
) {
    let warnings = with_issues(source, identity).validate().expect("valid");
    assert_eq!(warnings.len(), expected_warnings, "{warnings:?}");
}

#[rstest]
#[case(1, true)]
#[case(DEFAULT_BATCH_SIZE, true)]
#[case(100, true)]
#[case(0, false)]
#[case(101, false)]
fn batch_size_bounds(#[case] batch_size: usize, #[case] ok: bool) {
    let config = Config {
        batch_size,
        ..with_issues(SourceMode::Assigned, IdentityStrategy::Url)
    };
    assert_eq!(config.validate().is_ok(), ok);
}

#[test]
fn repository_source_requires_owner_and_name() {
    let config = with_issues(
        SourceMode::Repository {
            owner: String::new(),
            name: "r".into(),
        },
        IdentityStrategy::Url,
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("owner and name"));
}

#[test]
fn empty_database_id_is_rejected() {
    let mut config = with_issues(SourceMode::Assigned, IdentityStrategy::Url);
    if let Some(issues) = config.collections.issues.as_mut() {
        issues.database_id = " ".into();
    }
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("database_id"));
}

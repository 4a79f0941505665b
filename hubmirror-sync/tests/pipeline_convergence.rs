use chrono::{DateTime, TimeZone, Utc};
use hubmirror_core::{
    CollectionConfig, Config, DatabaseId, IdentityStrategy, ItemState, RepoRef, SourceMode,
};
use hubmirror_sync::memory::{MemorySink, MemorySource};
use hubmirror_sync::properties::{FieldValue, PropertyMapper};
use hubmirror_sync::source::{RawIssue, RawPullRequest};
use hubmirror_sync::{run_sync, ErrorKind, RunOptions, SyncError};
use serde_json::json;

const ISSUES_DB: &str = "issues-db";
const PRS_DB: &str = "prs-db";

fn assigned_issue(number: u64) -> RawIssue {
    serde_json::from_value(json!({
        "number": number,
        "title": format!("issue {number}"),
        "state": "open",
        "html_url": format!("https://github.com/octo/hello/issues/{number}"),
        "user": { "login": "mona" },
        "repository": { "name": "hello" },
        "updated_at": "2024-03-02T12:00:00Z"
    }))
    .expect("issue fixture")
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

fn pull(number: u64, state: ItemState) -> RawPullRequest {
    RawPullRequest {
        number,
        title: format!("pr {number}"),
        state,
        html_url: format!("https://github.com/octo/hello/pull/{number}"),
        user: None,
        updated_at: Some(at(2)),
        closed_at: (state == ItemState::Closed).then(|| at(9)),
    }
}

fn issues_config(identity: IdentityStrategy) -> Config {
    let mut config = Config::default();
    let mut issues = CollectionConfig::new(ISSUES_DB, SourceMode::Assigned);
    issues.identity = identity;
    config.collections.issues = Some(issues);
    config
}

fn issue_source(count: u64) -> MemorySource {
    MemorySource::new()
        .with_page_size(7)
        .with_assigned((1..=count).map(assigned_issue).collect())
}

#[tokio::test]
async fn second_run_updates_instead_of_creating() {
    let db = DatabaseId::from(ISSUES_DB);
    let source = issue_source(30);
    let sink = MemorySink::new().with_page_size(8);
    let config = issues_config(IdentityStrategy::Url);

    let first = run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .expect("first run");
    assert_eq!(first.created, 30);
    assert_eq!(first.updated, 0);
    let after_first = sink.pages(&db);

    let second = run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .expect("second run");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 30);
    assert!(second.is_clean());
    assert_eq!(sink.update_calls(), 30);

    // Same pages, same ids, same properties, none archived.
    let after_second = sink.pages(&db);
    assert_eq!(after_second, after_first);
    assert!(after_second.iter().all(|page| !page.archived));
}

#[tokio::test]
async fn number_identity_converges_without_lookups() {
    let source = issue_source(12);
    let sink = MemorySink::new();
    let config = issues_config(IdentityStrategy::Number);

    run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .expect("first run");
    let second = run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .expect("second run");

    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 12);
    assert_eq!(sink.lookup_calls(), 0);
}

#[tokio::test]
async fn archived_page_is_restored_by_update() {
    let db = DatabaseId::from(ISSUES_DB);
    let source = issue_source(1);
    let sink = MemorySink::new();
    let mapper = PropertyMapper::default();
    let stale = assigned_issue(1).into_item(hubmirror_core::ItemKind::Issue, None);
    let page = sink.seed(&db, mapper.map(&stale), true);

    let summary = run_sync(&source, &sink, &issues_config(IdentityStrategy::Url), RunOptions::default())
        .await
        .expect("run");

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert!(!sink.page(&page).expect("page").archived);
}

#[tokio::test]
async fn failed_identity_lookup_degrades_to_duplicate_create() {
    let db = DatabaseId::from(ISSUES_DB);
    let source = issue_source(3);
    let sink = MemorySink::new();
    let mapper = PropertyMapper::default();
    for n in 1..=3 {
        let item = assigned_issue(n).into_item(hubmirror_core::ItemKind::Issue, None);
        let page = sink.seed(&db, mapper.map(&item), false);
        if n == 2 {
            sink.fail_lookup_for(&page);
        }
    }

    let summary = run_sync(&source, &sink, &issues_config(IdentityStrategy::Url), RunOptions::default())
        .await
        .expect("a lookup failure is not fatal");

    assert_eq!(summary.updated, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].kind, ErrorKind::PropertyLookup);
    assert_eq!(sink.pages(&db).len(), 4);
}

#[tokio::test]
async fn write_failures_are_recorded_and_siblings_complete() {
    let source = issue_source(5);
    let sink = MemorySink::new();
    sink.fail_writes_titled("issue 3");

    let summary = run_sync(&source, &sink, &issues_config(IdentityStrategy::Url), RunOptions::default())
        .await
        .expect("write failures are not fatal");

    assert_eq!(summary.created, 4);
    assert_eq!(summary.errors.len(), 1);
    let error = &summary.errors[0];
    assert_eq!(error.kind, ErrorKind::Create);
    assert_eq!(error.collection, "issues");
    assert_eq!(error.subject, "https://github.com/octo/hello/issues/3");
    assert_eq!(summary.collections[0].failed, 1);
}

#[tokio::test]
async fn source_pagination_failure_aborts_before_any_write() {
    let repo = RepoRef::new("octo", "broken");
    let source = MemorySource::new()
        .with_repository(repo.clone(), vec![assigned_issue(1)], vec![])
        .failing_repository(repo.clone());
    let sink = MemorySink::new();
    let mut config = Config::default();
    config.collections.issues = Some(CollectionConfig::new(ISSUES_DB, SourceMode::repository(&repo)));

    let err = run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Pagination { .. }), "got: {err}");
    assert_eq!(sink.create_calls(), 0);
    assert_eq!(sink.update_calls(), 0);
}

#[tokio::test]
async fn sink_query_failure_aborts_the_run() {
    let source = issue_source(2);
    let sink = MemorySink::new();
    sink.fail_queries();

    let err = run_sync(&source, &sink, &issues_config(IdentityStrategy::Url), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Pagination { .. }), "got: {err}");
    assert_eq!(sink.create_calls(), 0);
}

#[tokio::test]
async fn both_collections_land_in_their_own_databases() {
    let repo = RepoRef::new("octo", "hello");
    let source = MemorySource::new()
        .with_assigned(vec![assigned_issue(1), assigned_issue(2)])
        .with_repository(
            repo.clone(),
            vec![],
            vec![pull(10, ItemState::Open), pull(11, ItemState::Closed)],
        );
    let sink = MemorySink::new();
    let mut config = issues_config(IdentityStrategy::Url);
    config.collections.pull_requests =
        Some(CollectionConfig::new(PRS_DB, SourceMode::repository(&repo)));

    let summary = run_sync(&source, &sink, &config, RunOptions::default())
        .await
        .expect("run");

    assert_eq!(summary.created, 4);
    let names: Vec<&str> = summary
        .collections
        .iter()
        .map(|c| c.collection.as_str())
        .collect();
    assert_eq!(names, vec!["issues", "pull_requests"]);
    assert_eq!(sink.pages(&DatabaseId::from(ISSUES_DB)).len(), 2);

    let prs = sink.pages(&DatabaseId::from(PRS_DB));
    assert_eq!(prs.len(), 2);
    let closed = prs
        .iter()
        .find(|p| p.properties["ID"] == FieldValue::Number(Some(11)))
        .expect("closed pr page");
    assert_eq!(closed.properties["Date"], FieldValue::Date(Some(at(9))));
    assert_eq!(closed.properties["Author"], FieldValue::Select(Some("ghost".into())));
    assert_eq!(closed.properties["State"], FieldValue::Select(Some("closed".into())));
}

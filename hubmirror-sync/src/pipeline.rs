//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::path::Path;
use std::time::Duration;

use hubmirror_core::{config, CollectionConfig, Config, Credentials, ItemKind};

use crate::batch::BatchWriter;
use crate::error::{ErrorRecord, SyncError};
use crate::github::GitHubClient;
use crate::index::SinkIndexBuilder;
use crate::notion::NotionClient;
use crate::properties::PropertyMapper;
use crate::reconcile::reconcile;
use crate::run_store;
use crate::sink::SinkApi;
use crate::source::{SourceApi, SourceReader};
use crate::summary::{CollectionSummary, SyncRunSummary};

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Index, fetch and reconcile, but skip every write.
    pub dry_run: bool,
}

/// Run the sync against the real services.
///
/// This is the canonical sync entrypoint for both `hubmirror sync` and the
/// daemon. Loads the effective config under `home`, reads credentials from
/// the environment and records the outcome in the run store (dry runs are
/// not recorded).
pub async fn run(home: &Path, options: RunOptions) -> Result<SyncRunSummary, SyncError> {
    let result = run_configured(home, options).await;
    if !options.dry_run {
        run_store::record_at(home, &result);
    }
    result
}

async fn run_configured(home: &Path, options: RunOptions) -> Result<SyncRunSummary, SyncError> {
    let (config, warnings) = config::load_effective_at(home)?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    let credentials = Credentials::from_env()?;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let github =
        GitHubClient::new(&credentials.github_token, timeout).map_err(SyncError::Client)?;
    let notion =
        NotionClient::new(&credentials.notion_token, timeout).map_err(SyncError::Client)?;

    run_sync(&github, &notion, &config, options).await
}

/// Mirror every configured collection from `source` into `sink`.
///
/// Collections run one after the other, issues first. Any pagination failure
/// aborts the run; per-item failures are collected into the summary.
pub async fn run_sync<Src, Snk>(
    source: &Src,
    sink: &Snk,
    config: &Config,
    options: RunOptions,
) -> Result<SyncRunSummary, SyncError>
where
    Src: SourceApi + ?Sized,
    Snk: SinkApi + ?Sized,
{
    let mut summary = SyncRunSummary::new(options.dry_run);
    let mapper = PropertyMapper::new(config.properties.clone());

    for (kind, collection) in config.collections() {
        let (detail, errors) = sync_collection(
            source,
            sink,
            &mapper,
            config.batch_size,
            kind,
            collection,
            options,
        )
        .await?;
        summary.push(detail, errors);
    }
    summary.finish();

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        errors = summary.errors.len(),
        dry_run = summary.dry_run,
        "sync run finished"
    );
    Ok(summary)
}

async fn sync_collection<Src, Snk>(
    source: &Src,
    sink: &Snk,
    mapper: &PropertyMapper,
    batch_size: usize,
    kind: ItemKind,
    collection: &CollectionConfig,
    options: RunOptions,
) -> Result<(CollectionSummary, Vec<ErrorRecord>), SyncError>
where
    Src: SourceApi + ?Sized,
    Snk: SinkApi + ?Sized,
{
    let name = kind.collection();
    let database = &collection.database_id;

    // 1. Index the sink.
    let index = SinkIndexBuilder::new(sink, mapper.names())
        .build(name, database, collection.identity)
        .await?;

    // 2. Fetch the source.
    let items = SourceReader::new(source)
        .fetch(kind, &collection.source)
        .await?;
    let fetched = items.len();

    // 3. Reconcile.
    let plan = reconcile(items, &index.map, &collection.identity);
    tracing::info!(
        collection = name,
        fetched,
        to_create = plan.to_create.len(),
        to_update = plan.to_update.len(),
        "reconciled"
    );

    let mut detail = CollectionSummary {
        collection: name.to_string(),
        database_id: database.clone(),
        identity: collection.identity,
        indexed: index.pages,
        duplicates: index.duplicates.len(),
        unresolved: index.unresolved,
        fetched,
        planned_creates: plan.to_create.len(),
        planned_updates: plan.to_update.len(),
        ..CollectionSummary::default()
    };
    let mut errors = index.lookup_failures;

    if options.dry_run {
        tracing::info!(collection = name, "dry run; skipping writes");
        return Ok((detail, errors));
    }

    // 4. Write creates, then updates.
    let writer = BatchWriter::new(sink, mapper, batch_size, name);
    let created = writer.create_all(database, &plan.to_create).await;
    let updated = writer.update_all(&plan.to_update).await;

    detail.created = created.succeeded;
    detail.updated = updated.succeeded;
    detail.failed = created.failures.len() + updated.failures.len();
    errors.extend(created.failures);
    errors.extend(updated.failures);

    tracing::info!(
        collection = name,
        created = detail.created,
        updated = detail.updated,
        failed = detail.failed,
        "collection synced"
    );
    Ok((detail, errors))
}

//! Bounded-concurrency writes.
//!
//! Operations are split into consecutive batches of at most `batch_size`.
//! Inside a batch every operation runs concurrently; the next batch starts
//! only after every operation of the current one has settled. A failed
//! operation is recorded and never cancels its siblings.

use std::future::Future;

use futures::future::join_all;

use hubmirror_core::{DatabaseId, SyncItem};

use crate::error::{ApiError, ErrorKind, ErrorRecord};
use crate::properties::PropertyMapper;
use crate::reconcile::PendingUpdate;
use crate::sink::SinkApi;

/// Outcome of one batched write phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    /// Size of each batch in execution order.
    pub batch_sizes: Vec<usize>,
    pub failures: Vec<ErrorRecord>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.batch_sizes.iter().sum()
    }
}

/// Run `op` over `ops` in batches. `op` returns the subject it concerns
/// alongside the outcome, so failures can be attributed.
pub(crate) async fn run_batched<'t, T, F, Fut>(
    collection: &str,
    kind: ErrorKind,
    ops: &'t [T],
    batch_size: usize,
    mut op: F,
) -> BatchReport
where
    F: FnMut(&'t T) -> Fut,
    Fut: Future<Output = (String, Result<(), ApiError>)>,
{
    let mut report = BatchReport::default();
    let total = ops.chunks(batch_size.max(1)).count();

    for (n, chunk) in ops.chunks(batch_size.max(1)).enumerate() {
        let settled = join_all(chunk.iter().map(&mut op)).await;
        report.batch_sizes.push(chunk.len());

        let mut failed = 0usize;
        for (subject, outcome) in settled {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(collection, %kind, subject = %subject, error = %err, "write failed");
                    report
                        .failures
                        .push(ErrorRecord::new(kind, collection, subject, &err));
                }
            }
        }
        tracing::debug!(
            collection,
            %kind,
            batch = n + 1,
            of = total,
            size = chunk.len(),
            failed,
            "batch settled"
        );
    }
    report
}

/// Writes creates and updates for one collection.
pub struct BatchWriter<'a, S: ?Sized> {
    sink: &'a S,
    mapper: &'a PropertyMapper,
    batch_size: usize,
    collection: &'a str,
}

impl<'a, S: SinkApi + ?Sized> BatchWriter<'a, S> {
    pub fn new(
        sink: &'a S,
        mapper: &'a PropertyMapper,
        batch_size: usize,
        collection: &'a str,
    ) -> Self {
        Self {
            sink,
            mapper,
            batch_size,
            collection,
        }
    }

    /// Create one page per item in `database`.
    pub async fn create_all(&self, database: &DatabaseId, items: &[SyncItem]) -> BatchReport {
        let sink = self.sink;
        let mapper = self.mapper;
        run_batched(
            self.collection,
            ErrorKind::Create,
            items,
            self.batch_size,
            |item| async move {
                let properties = mapper.map(item);
                let outcome = sink.create_page(database, &properties).await.map(|_| ());
                (item.url.clone(), outcome)
            },
        )
        .await
    }

    /// Overwrite the mapped properties of each known page and unarchive it.
    pub async fn update_all(&self, updates: &[PendingUpdate]) -> BatchReport {
        let sink = self.sink;
        let mapper = self.mapper;
        run_batched(
            self.collection,
            ErrorKind::Update,
            updates,
            self.batch_size,
            |update| async move {
                let properties = mapper.map(&update.item);
                let outcome = sink.update_page(&update.page_id, &properties, false).await;
                (update.page_id.0.clone(), outcome)
            },
        )
        .await
    }
}

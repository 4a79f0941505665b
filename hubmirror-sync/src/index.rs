//! Sink index: drain a sink database and resolve each page's identity.
//!
//! Two resolution modes:
//!
//! - **number**: the identity is the number property already on the listed
//!   page; no extra requests.
//! - **url**: listings may truncate the URL property, so each page's value
//!   is fetched with one property-retrieval call. The calls run concurrently
//!   and are gathered with failures kept apart: a failed lookup leaves that
//!   page out of the map and is reported, it never fails the build.

use futures::future::join_all;

use hubmirror_core::{DatabaseId, IdentityKey, IdentityStrategy, PropertyNames, SinkPageId};

use crate::error::{ErrorKind, ErrorRecord, SyncError};
use crate::identity::{IdentityMap, SinkRecord};
use crate::paginate::drain_pages;
use crate::sink::{SinkApi, SinkPage};

/// Result of indexing one sink database.
#[derive(Debug, Clone, Default)]
pub struct SinkIndex {
    pub map: IdentityMap,
    /// Pages returned by the database query.
    pub pages: usize,
    /// Pages whose identity was already taken by an earlier page.
    pub duplicates: Vec<SinkRecord>,
    /// Pages without a usable identity value.
    pub unresolved: usize,
    /// Failed property lookups (url mode only).
    pub lookup_failures: Vec<ErrorRecord>,
}

/// Builds the identity map of one sink database.
pub struct SinkIndexBuilder<'a, S: ?Sized> {
    sink: &'a S,
    names: &'a PropertyNames,
}

impl<'a, S: SinkApi + ?Sized> SinkIndexBuilder<'a, S> {
    pub fn new(sink: &'a S, names: &'a PropertyNames) -> Self {
        Self { sink, names }
    }

    pub async fn build(
        &self,
        collection: &str,
        database: &DatabaseId,
        strategy: IdentityStrategy,
    ) -> Result<SinkIndex, SyncError> {
        let sink = self.sink;
        let context = format!("{collection} database {database}");
        let pages = drain_pages(&context, |cursor| async move {
            sink.query_database(database, cursor.as_deref()).await
        })
        .await?;
        let page_count = pages.len();

        let (records, lookup_failures) = match strategy {
            IdentityStrategy::Number => (self.direct_records(&pages), Vec::new()),
            IdentityStrategy::Url => self.lookup_records(collection, &pages).await,
        };
        let unresolved = page_count - records.len() - lookup_failures.len();

        let (map, duplicates) = IdentityMap::from_records(records);
        if !duplicates.is_empty() {
            tracing::warn!(
                collection,
                duplicates = duplicates.len(),
                "sink holds several pages for the same identity; using the first"
            );
        }
        if !lookup_failures.is_empty() {
            tracing::warn!(
                collection,
                failed = lookup_failures.len(),
                "identity lookups failed; those pages are left out of the index"
            );
        }
        tracing::info!(
            collection,
            pages = page_count,
            mapped = map.len(),
            unresolved,
            "sink index built"
        );

        Ok(SinkIndex {
            map,
            pages: page_count,
            duplicates,
            unresolved,
            lookup_failures,
        })
    }

    fn direct_records(&self, pages: &[SinkPage]) -> Vec<SinkRecord> {
        pages
            .iter()
            .filter_map(|page| {
                let number = page.properties.get(&self.names.number)?.as_item_number()?;
                Some(SinkRecord {
                    page_id: page.id.clone(),
                    identity: IdentityKey::Number(number),
                })
            })
            .collect()
    }

    async fn lookup_records(
        &self,
        collection: &str,
        pages: &[SinkPage],
    ) -> (Vec<SinkRecord>, Vec<ErrorRecord>) {
        let sink = self.sink;
        let lookups = pages.iter().filter_map(|page| {
            let property_id = page.properties.get(&self.names.url)?.id.as_str();
            Some(async move {
                let outcome = sink.retrieve_property(&page.id, property_id).await;
                (&page.id, outcome)
            })
        });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (page_id, outcome) in join_all(lookups).await {
            match outcome {
                Ok(value) => {
                    if let Some(url) = value.as_url() {
                        records.push(record(page_id, IdentityKey::Url(url.to_string())));
                    }
                }
                Err(err) => {
                    tracing::debug!(collection, page = %page_id, error = %err, "identity lookup failed");
                    failures.push(ErrorRecord::new(
                        ErrorKind::PropertyLookup,
                        collection,
                        page_id.0.clone(),
                        &err,
                    ));
                }
            }
        }
        (records, failures)
    }
}

fn record(page_id: &SinkPageId, identity: IdentityKey) -> SinkRecord {
    SinkRecord {
        page_id: page_id.clone(),
        identity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySink;
    use crate::properties::{FieldValue, PropertySet};

    fn props(number: u64, url: &str) -> PropertySet {
        let mut set = PropertySet::new();
        set.insert("Name".into(), FieldValue::Title(format!("item {number}")));
        set.insert("ID".into(), FieldValue::Number(Some(number)));
        set.insert("URL".into(), FieldValue::Url(Some(url.into())));
        set
    }

    fn url(n: u64) -> String {
        format!("https://github.com/o/r/issues/{n}")
    }

    #[tokio::test]
    async fn direct_mode_reads_number_property_across_pages() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new().with_page_size(2);
        for n in 1..=5 {
            sink.seed(&db, props(n, &url(n)), false);
        }
        let names = PropertyNames::default();

        let index = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Number)
            .await
            .expect("index");

        assert_eq!(index.pages, 5);
        assert_eq!(index.map.len(), 5);
        assert!(index.map.contains(&IdentityKey::Number(3)));
        assert_eq!(sink.query_calls(), 3);
        assert_eq!(sink.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn indirect_mode_resolves_urls_through_lookups() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new();
        let first = sink.seed(&db, props(1, &url(1)), false);
        sink.seed(&db, props(2, &url(2)), true);
        let names = PropertyNames::default();

        let index = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Url)
            .await
            .expect("index");

        assert_eq!(sink.lookup_calls(), 2);
        assert_eq!(index.map.get(&IdentityKey::Url(url(1))), Some(&first));
        assert_eq!(index.map.len(), 2, "archived pages stay indexed");
    }

    #[tokio::test]
    async fn failed_lookup_degrades_one_page_only() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new();
        sink.seed(&db, props(1, &url(1)), false);
        let broken = sink.seed(&db, props(2, &url(2)), false);
        sink.seed(&db, props(3, &url(3)), false);
        sink.fail_lookup_for(&broken);
        let names = PropertyNames::default();

        let index = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Url)
            .await
            .expect("a failed lookup must not fail the build");

        assert_eq!(index.map.len(), 2);
        assert!(!index.map.contains(&IdentityKey::Url(url(2))));
        assert_eq!(index.lookup_failures.len(), 1);
        assert_eq!(index.lookup_failures[0].kind, ErrorKind::PropertyLookup);
        assert_eq!(index.lookup_failures[0].subject, broken.0);
        assert_eq!(index.unresolved, 0);
    }

    #[tokio::test]
    async fn pages_without_identity_are_unresolved() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new();
        sink.seed(&db, props(1, &url(1)), false);
        let mut empty = PropertySet::new();
        empty.insert("Name".into(), FieldValue::Title("hand-made".into()));
        empty.insert("ID".into(), FieldValue::Number(None));
        sink.seed(&db, empty, false);
        let names = PropertyNames::default();

        let index = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Number)
            .await
            .expect("index");
        assert_eq!(index.map.len(), 1);
        assert_eq!(index.unresolved, 1);
    }

    #[tokio::test]
    async fn duplicate_pages_keep_first_in_query_order() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new();
        let first = sink.seed(&db, props(1, &url(1)), false);
        let second = sink.seed(&db, props(1, &url(1)), false);
        let names = PropertyNames::default();

        let index = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Number)
            .await
            .expect("index");
        assert_eq!(index.map.get(&IdentityKey::Number(1)), Some(&first));
        assert_eq!(index.duplicates.len(), 1);
        assert_eq!(index.duplicates[0].page_id, second);
    }

    #[tokio::test]
    async fn query_failure_is_fatal() {
        let db = DatabaseId::from("db");
        let sink = MemorySink::new();
        sink.fail_queries();
        let names = PropertyNames::default();

        let err = SinkIndexBuilder::new(&sink, &names)
            .build("issues", &db, IdentityStrategy::Number)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Pagination { .. }), "got: {err}");
    }
}

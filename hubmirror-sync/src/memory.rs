//! In-memory [`SourceApi`] and [`SinkApi`] implementations.
//!
//! Both paginate with offset cursors and can be told to fail specific calls.
//! Built for unit tests and with the `testing` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use hubmirror_core::{DatabaseId, RepoRef, SinkPageId};

use crate::error::ApiError;
use crate::properties::{FieldValue, PropertySet};
use crate::sink::{PageProperty, SinkApi, SinkPage};
use crate::source::{Page, RawIssue, RawPullRequest, RawRepository, RawUser, SourceApi};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Slice `items` at the offset encoded in `cursor`.
fn page_of<T: Clone>(items: &[T], cursor: Option<&str>, size: usize) -> Result<Page<T>, ApiError> {
    let start = match cursor {
        None => 0,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::Rejected(format!("invalid cursor {raw:?}")))?,
    };
    let end = (start + size.max(1)).min(items.len());
    let slice = items.get(start..end).unwrap_or_default().to_vec();
    Ok(if end < items.len() {
        Page::with_next(slice, end.to_string())
    } else {
        Page::last(slice)
    })
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

struct MemoryRepository {
    repo: RepoRef,
    issues: Vec<RawIssue>,
    pulls: Vec<RawPullRequest>,
}

/// Source serving fixed listings.
pub struct MemorySource {
    page_size: usize,
    assigned: Vec<RawIssue>,
    repositories: Vec<MemoryRepository>,
    failing: HashSet<RepoRef>,
    calls: AtomicUsize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            assigned: Vec::new(),
            repositories: Vec::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Entries of the assigned-items listing.
    pub fn with_assigned(mut self, issues: Vec<RawIssue>) -> Self {
        self.assigned = issues;
        self
    }

    /// Add a repository; repositories are listed in insertion order.
    pub fn with_repository(
        mut self,
        repo: RepoRef,
        issues: Vec<RawIssue>,
        pulls: Vec<RawPullRequest>,
    ) -> Self {
        self.repositories.push(MemoryRepository { repo, issues, pulls });
        self
    }

    /// Make every listing of `repo` fail.
    pub fn failing_repository(mut self, repo: RepoRef) -> Self {
        self.failing.insert(repo);
        self
    }

    /// Page requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn repository(&self, repo: &RepoRef) -> Result<&MemoryRepository, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(repo) {
            return Err(ApiError::Status {
                service: "memory",
                status: 502,
                body: format!("listing of {repo} unavailable"),
            });
        }
        self.repositories
            .iter()
            .find(|r| &r.repo == repo)
            .ok_or_else(|| ApiError::Status {
                service: "memory",
                status: 404,
                body: format!("no repository {repo}"),
            })
    }
}

#[async_trait]
impl SourceApi for MemorySource {
    async fn list_assigned_issues(&self, cursor: Option<&str>) -> Result<Page<RawIssue>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        page_of(&self.assigned, cursor, self.page_size)
    }

    async fn list_repositories(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<RawRepository>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let repos: Vec<RawRepository> = self
            .repositories
            .iter()
            .map(|r| RawRepository {
                name: r.repo.name.clone(),
                owner: RawUser {
                    login: r.repo.owner.clone(),
                },
            })
            .collect();
        page_of(&repos, cursor, self.page_size)
    }

    async fn list_repository_issues(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawIssue>, ApiError> {
        page_of(&self.repository(repo)?.issues, cursor, self.page_size)
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawPullRequest>, ApiError> {
        page_of(&self.repository(repo)?.pulls, cursor, self.page_size)
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// A page held by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub id: SinkPageId,
    pub database: DatabaseId,
    pub archived: bool,
    pub properties: PropertySet,
}

#[derive(Default)]
struct SinkState {
    pages: Vec<StoredPage>,
    next_id: usize,
    failing_titles: HashSet<String>,
    failing_lookups: HashSet<SinkPageId>,
}

/// Sink keeping pages in memory.
///
/// Query listings carry number values but no URL values, the way a real
/// listing may truncate them; [`SinkApi::retrieve_property`] returns both.
pub struct MemorySink {
    page_size: usize,
    state: Mutex<SinkState>,
    fail_queries: AtomicBool,
    query_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(SinkState::default()),
            fail_queries: AtomicBool::new(false),
            query_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Store a page directly, bypassing call accounting.
    pub fn seed(&self, database: &DatabaseId, properties: PropertySet, archived: bool) -> SinkPageId {
        self.state.lock().insert(database, properties, archived)
    }

    /// Pages of `database` in creation order.
    pub fn pages(&self, database: &DatabaseId) -> Vec<StoredPage> {
        self.state
            .lock()
            .pages
            .iter()
            .filter(|p| &p.database == database)
            .cloned()
            .collect()
    }

    pub fn page(&self, id: &SinkPageId) -> Option<StoredPage> {
        self.state.lock().pages.iter().find(|p| &p.id == id).cloned()
    }

    /// Fail creates and updates whose title property equals `title`.
    pub fn fail_writes_titled(&self, title: &str) {
        self.state.lock().failing_titles.insert(title.to_string());
    }

    /// Fail property retrieval for `page`.
    pub fn fail_lookup_for(&self, page: &SinkPageId) {
        self.state.lock().failing_lookups.insert(page.clone());
    }

    /// Fail every database query.
    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Highest number of writes observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Count a write as in flight and yield, so that concurrent writes
    /// overlap before any of them completes.
    async fn enter_write(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }

    fn leave_write(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check_writable(&self, state: &SinkState, properties: &PropertySet) -> Result<(), ApiError> {
        match title_of(properties) {
            Some(title) if state.failing_titles.contains(title) => Err(ApiError::Status {
                service: "memory",
                status: 400,
                body: format!("write of {title:?} refused"),
            }),
            _ => Ok(()),
        }
    }
}

impl SinkState {
    fn insert(&mut self, database: &DatabaseId, properties: PropertySet, archived: bool) -> SinkPageId {
        self.next_id += 1;
        let id = SinkPageId(format!("page-{}", self.next_id));
        self.pages.push(StoredPage {
            id: id.clone(),
            database: database.clone(),
            archived,
            properties,
        });
        id
    }
}

/// The value of the page's title property, whatever it is named.
fn title_of(properties: &PropertySet) -> Option<&str> {
    properties.values().find_map(|value| match value {
        FieldValue::Title(title) => Some(title.as_str()),
        _ => None,
    })
}

fn property_handle(name: &str) -> String {
    format!("prop-{name}")
}

fn listed_property(name: &str, value: &FieldValue) -> PageProperty {
    PageProperty {
        id: property_handle(name),
        number: match value {
            FieldValue::Number(Some(n)) => Some(*n as f64),
            _ => None,
        },
        url: None,
    }
}

#[async_trait]
impl SinkApi for MemorySink {
    async fn query_database(
        &self,
        database: &DatabaseId,
        cursor: Option<&str>,
    ) -> Result<Page<SinkPage>, ApiError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                service: "memory",
                status: 503,
                body: "query unavailable".into(),
            });
        }
        let listed: Vec<SinkPage> = self
            .pages(database)
            .into_iter()
            .map(|page| SinkPage {
                id: page.id,
                archived: page.archived,
                properties: page
                    .properties
                    .iter()
                    .map(|(name, value)| (name.clone(), listed_property(name, value)))
                    .collect(),
            })
            .collect();
        page_of(&listed, cursor, self.page_size)
    }

    async fn create_page(
        &self,
        database: &DatabaseId,
        properties: &PropertySet,
    ) -> Result<SinkPageId, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.enter_write().await;
        let outcome = {
            let mut state = self.state.lock();
            self.check_writable(&state, properties)
                .map(|()| state.insert(database, properties.clone(), false))
        };
        self.leave_write();
        outcome
    }

    async fn update_page(
        &self,
        page: &SinkPageId,
        properties: &PropertySet,
        archived: bool,
    ) -> Result<(), ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.enter_write().await;
        let outcome = {
            let mut state = self.state.lock();
            self.check_writable(&state, properties).and_then(|()| {
                let stored = state
                    .pages
                    .iter_mut()
                    .find(|p| &p.id == page)
                    .ok_or_else(|| ApiError::Rejected(format!("no page {page}")))?;
                stored
                    .properties
                    .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                stored.archived = archived;
                Ok(())
            })
        };
        self.leave_write();
        outcome
    }

    async fn retrieve_property(
        &self,
        page: &SinkPageId,
        property_id: &str,
    ) -> Result<PageProperty, ApiError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.failing_lookups.contains(page) {
            return Err(ApiError::Status {
                service: "memory",
                status: 502,
                body: format!("property lookup for {page} failed"),
            });
        }
        let stored = state
            .pages
            .iter()
            .find(|p| &p.id == page)
            .ok_or_else(|| ApiError::Rejected(format!("no page {page}")))?;
        let (name, value) = stored
            .properties
            .iter()
            .find(|(name, _)| property_handle(name) == property_id)
            .ok_or_else(|| ApiError::Rejected(format!("no property {property_id} on {page}")))?;
        let mut property = listed_property(name, value);
        if let FieldValue::Url(url) = value {
            property.url = url.clone();
        }
        Ok(property)
    }
}

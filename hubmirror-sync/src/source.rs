//! Source side: the tracked-item API and the reader that normalizes it.
//!
//! [`SourceApi`] is one page request per call. [`SourceReader`] drains the
//! listings a [`SourceMode`] needs and turns them into [`SyncItem`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use hubmirror_core::{ItemKind, ItemState, RepoRef, SourceMode, SyncItem};

use crate::error::{ApiError, SyncError};
use crate::paginate::drain_pages;

/// Author placeholder for items whose user account is gone.
pub const GHOST_AUTHOR: &str = "ghost";

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// One page of a listing plus the cursor of the next page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn with_next(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: Some(next.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUser {
    pub login: String,
}

/// Repository as returned by the repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepository {
    pub name: String,
    pub owner: RawUser,
}

impl RawRepository {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner.login, &self.name)
    }
}

/// Repository stub embedded in cross-repository issue listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepositoryName {
    pub name: String,
}

/// Entry of an issue listing. Pull requests appear here too, marked by
/// `pull_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    pub html_url: String,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub repository: Option<RawRepositoryName>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    pub html_url: String,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Last-update time while open, closure time once closed.
///
/// A closed item without `closed_at` falls back to `updated_at`.
pub fn transition_timestamp(
    state: ItemState,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match state {
        ItemState::Open => updated_at,
        ItemState::Closed => closed_at.or(updated_at),
    }
}

fn author_of(user: Option<RawUser>) -> String {
    user.map(|u| u.login)
        .filter(|login| !login.is_empty())
        .unwrap_or_else(|| GHOST_AUTHOR.to_string())
}

impl RawIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Normalize into a [`SyncItem`]. `repository` names the repository when
    /// the listing itself does not embed it.
    pub fn into_item(self, kind: ItemKind, repository: Option<&str>) -> SyncItem {
        let repository = self
            .repository
            .map(|r| r.name)
            .or_else(|| repository.map(str::to_owned));
        SyncItem {
            kind,
            number: self.number,
            timestamp: transition_timestamp(self.state, self.updated_at, self.closed_at),
            title: self.title,
            state: self.state,
            url: self.html_url,
            repository,
            author: author_of(self.user),
        }
    }
}

impl RawPullRequest {
    pub fn into_item(self, repository: &str) -> SyncItem {
        SyncItem {
            kind: ItemKind::PullRequest,
            number: self.number,
            timestamp: transition_timestamp(self.state, self.updated_at, self.closed_at),
            title: self.title,
            state: self.state,
            url: self.html_url,
            repository: Some(repository.to_string()),
            author: author_of(self.user),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceApi
// ---------------------------------------------------------------------------

/// Paginated listing endpoints of the source. Each call fetches one page;
/// `cursor` is the `next` value of the previous page.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Issues (and pull requests) assigned to the authenticated user.
    async fn list_assigned_issues(&self, cursor: Option<&str>)
        -> Result<Page<RawIssue>, ApiError>;

    /// Repositories the authenticated user owns or collaborates on.
    async fn list_repositories(&self, cursor: Option<&str>)
        -> Result<Page<RawRepository>, ApiError>;

    /// Issues (and pull requests) of one repository, all states.
    async fn list_repository_issues(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawIssue>, ApiError>;

    /// Pull requests of one repository, all states.
    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawPullRequest>, ApiError>;
}

// ---------------------------------------------------------------------------
// SourceReader
// ---------------------------------------------------------------------------

/// Drains source listings into canonical items.
pub struct SourceReader<'a, S: ?Sized> {
    api: &'a S,
}

impl<'a, S: SourceApi + ?Sized> SourceReader<'a, S> {
    pub fn new(api: &'a S) -> Self {
        Self { api }
    }

    /// Fetch every item of `kind` visible through `mode`.
    pub async fn fetch(&self, kind: ItemKind, mode: &SourceMode) -> Result<Vec<SyncItem>, SyncError> {
        let items = match mode {
            SourceMode::Assigned => self.fetch_assigned(kind).await?,
            SourceMode::Owned => {
                let repos = self.owned_repositories().await?;
                tracing::info!(repositories = repos.len(), "listed owned repositories");
                let mut items = Vec::new();
                for repo in &repos {
                    items.extend(self.fetch_repository(kind, repo).await?);
                }
                items
            }
            SourceMode::Repository { owner, name } => {
                self.fetch_repository(kind, &RepoRef::new(owner, name))
                    .await?
            }
        };
        tracing::debug!(%kind, %mode, items = items.len(), "source fetch complete");
        Ok(items)
    }

    async fn fetch_assigned(&self, kind: ItemKind) -> Result<Vec<SyncItem>, SyncError> {
        let api = self.api;
        let raw = drain_pages("assigned issues", |cursor| async move {
            api.list_assigned_issues(cursor.as_deref()).await
        })
        .await?;
        Ok(keep_kind(raw, kind, None))
    }

    async fn fetch_repository(
        &self,
        kind: ItemKind,
        repo: &RepoRef,
    ) -> Result<Vec<SyncItem>, SyncError> {
        let api = self.api;
        match kind {
            ItemKind::Issue => {
                let context = format!("issues of {repo}");
                let raw = drain_pages(&context, |cursor| async move {
                    api.list_repository_issues(repo, cursor.as_deref()).await
                })
                .await?;
                Ok(keep_kind(raw, kind, Some(&repo.name)))
            }
            ItemKind::PullRequest => {
                let context = format!("pull requests of {repo}");
                let raw = drain_pages(&context, |cursor| async move {
                    api.list_pull_requests(repo, cursor.as_deref()).await
                })
                .await?;
                Ok(raw.into_iter().map(|pr| pr.into_item(&repo.name)).collect())
            }
        }
    }

    async fn owned_repositories(&self) -> Result<Vec<RepoRef>, SyncError> {
        let api = self.api;
        let repos = drain_pages("owned repositories", |cursor| async move {
            api.list_repositories(cursor.as_deref()).await
        })
        .await?;
        Ok(repos.iter().map(RawRepository::repo_ref).collect())
    }
}

/// Keep the entries of an issue listing that belong to `kind`.
fn keep_kind(raw: Vec<RawIssue>, kind: ItemKind, repository: Option<&str>) -> Vec<SyncItem> {
    let want_pr = kind == ItemKind::PullRequest;
    raw.into_iter()
        .filter(|issue| issue.is_pull_request() == want_pr)
        .map(|issue| issue.into_item(kind, repository))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

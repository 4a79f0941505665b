//! GitHub REST client implementing [`SourceApi`].
//!
//! Listings paginate through the `Link` response header; the cursor handed
//! back in [`Page::next`] is the absolute URL of the next page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;

use hubmirror_core::RepoRef;

use crate::error::ApiError;
use crate::source::{Page, RawIssue, RawPullRequest, RawRepository, SourceApi};
use crate::transport::{build_client, send_json, Replay, RetryPolicy};

pub const GITHUB_API: &str = "https://api.github.com";
pub const GITHUB_API_VERSION: &str = "2022-11-28";
const SERVICE: &str = "github";
const PER_PAGE: usize = 100;

pub struct GitHubClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::with_base_url(GITHUB_API, token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            ApiError::Rejected("GitHub token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("hubmirror/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        Ok(Self {
            http: build_client(SERVICE, headers, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn first_page_url(&self, path: &str, query: &str) -> String {
        format!("{}{path}?{query}&per_page={PER_PAGE}", self.base_url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        first_page: String,
        cursor: Option<&str>,
    ) -> Result<Page<T>, ApiError> {
        let url = cursor.map(str::to_owned).unwrap_or(first_page);
        tracing::trace!(%url, "github page request");
        let (items, headers) =
            send_json::<Vec<T>, _>(SERVICE, &self.retry, Replay::Idempotent, || self.http.get(&url))
                .await?;
        let next = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);
        Ok(Page { items, next })
    }
}

/// The `rel="next"` target of a `Link` header, if any.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| url.to_string())
    })
}

#[async_trait]
impl SourceApi for GitHubClient {
    async fn list_assigned_issues(&self, cursor: Option<&str>) -> Result<Page<RawIssue>, ApiError> {
        let first = self.first_page_url("/issues", "filter=assigned&state=all");
        self.get_page(first, cursor).await
    }

    async fn list_repositories(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<RawRepository>, ApiError> {
        let first = self.first_page_url("/user/repos", "affiliation=owner,collaborator");
        self.get_page(first, cursor).await
    }

    async fn list_repository_issues(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawIssue>, ApiError> {
        let path = format!("/repos/{}/{}/issues", repo.owner, repo.name);
        let first = self.first_page_url(&path, "state=all");
        self.get_page(first, cursor).await
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        cursor: Option<&str>,
    ) -> Result<Page<RawPullRequest>, ApiError> {
        let path = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let first = self.first_page_url(&path, "state=all");
        self.get_page(first, cursor).await
    }
}

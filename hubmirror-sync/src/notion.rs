//! Notion API client implementing [`SinkApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Value};

use hubmirror_core::{DatabaseId, SinkPageId};

use crate::error::ApiError;
use crate::properties::{to_json_properties, PropertySet};
use crate::sink::{PageProperty, SinkApi, SinkPage};
use crate::source::Page;
use crate::transport::{build_client, send_json, Replay, RetryPolicy};

pub const NOTION_API: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const SERVICE: &str = "notion";
const QUERY_PAGE_SIZE: usize = 100;

pub struct NotionClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<SinkPage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl QueryResponse {
    fn into_page(self) -> Page<SinkPage> {
        Page {
            items: self.results,
            next: self.next_cursor.filter(|_| self.has_more),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: SinkPageId,
}

impl NotionClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::with_base_url(NOTION_API, token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            ApiError::Rejected("Notion token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert("notion-version", HeaderValue::from_static(NOTION_VERSION));

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

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn query_body(cursor: Option<&str>) -> Value {
    let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
    if let Some(cursor) = cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

#[async_trait]
impl SinkApi for NotionClient {
    async fn query_database(
        &self,
        database: &DatabaseId,
        cursor: Option<&str>,
    ) -> Result<Page<SinkPage>, ApiError> {
        let url = self.url(&format!("/databases/{database}/query"));
        let body = query_body(cursor);
        // A query is a read even though it is a POST.
        let (response, _) =
            send_json::<QueryResponse, _>(SERVICE, &self.retry, Replay::Idempotent, || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok(response.into_page())
    }

    async fn create_page(
        &self,
        database: &DatabaseId,
        properties: &PropertySet,
    ) -> Result<SinkPageId, ApiError> {
        let url = self.url("/pages");
        let body = json!({
            "parent": { "database_id": database },
            "properties": to_json_properties(properties),
        });
        // The page may exist even when the response is lost; a repeat would
        // store it twice.
        let (created, _) =
            send_json::<CreatedPage, _>(SERVICE, &self.retry, Replay::Undelivered, || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok(created.id)
    }

    async fn update_page(
        &self,
        page: &SinkPageId,
        properties: &PropertySet,
        archived: bool,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/pages/{page}"));
        let body = json!({
            "properties": to_json_properties(properties),
            "archived": archived,
        });
        send_json::<IgnoredAny, _>(SERVICE, &self.retry, Replay::Idempotent, || {
            self.http.patch(&url).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn retrieve_property(
        &self,
        page: &SinkPageId,
        property_id: &str,
    ) -> Result<PageProperty, ApiError> {
        let url = self.url(&format!("/pages/{page}/properties/{property_id}"));
        let (property, _) =
            send_json::<PageProperty, _>(SERVICE, &self.retry, Replay::Idempotent, || {
                self.http.get(&url)
            })
            .await?;
        Ok(property)
    }
}

//! Sink side: the document-store API the mirror writes into.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hubmirror_core::{DatabaseId, SinkPageId};

use crate::error::ApiError;
use crate::properties::PropertySet;
use crate::source::Page;

/// A stored page as returned by a database query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkPage {
    pub id: SinkPageId,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, PageProperty>,
}

/// The parts of a page property the identity resolution reads.
///
/// Query results may truncate values; `id` is the handle used to retrieve
/// the full value through [`SinkApi::retrieve_property`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageProperty {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PageProperty {
    /// The number value when it is a non-negative integer.
    pub fn as_item_number(&self) -> Option<u64> {
        self.number
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    }

    /// The URL value when present and non-blank.
    pub fn as_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Database query, page creation, page update and property retrieval.
#[async_trait]
pub trait SinkApi: Send + Sync {
    /// One page of the pages stored in `database`.
    async fn query_database(
        &self,
        database: &DatabaseId,
        cursor: Option<&str>,
    ) -> Result<Page<SinkPage>, ApiError>;

    /// Add a page to `database`.
    async fn create_page(
        &self,
        database: &DatabaseId,
        properties: &PropertySet,
    ) -> Result<SinkPageId, ApiError>;

    /// Overwrite the given properties of `page` and set its archived flag.
    async fn update_page(
        &self,
        page: &SinkPageId,
        properties: &PropertySet,
        archived: bool,
    ) -> Result<(), ApiError>;

    /// Full value of one property of `page`.
    async fn retrieve_property(
        &self,
        page: &SinkPageId,
        property_id: &str,
    ) -> Result<PageProperty, ApiError>;
}

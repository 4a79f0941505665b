//! Error types for hubmirror-sync.
//!
//! [`SyncError`] aborts a run. [`ErrorRecord`] describes a failure local to
//! one page or one write; those are collected into the run summary and never
//! abort anything.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hubmirror_core::ConfigError;

/// A failed call to one of the remote services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS or timeout failure after transport retries.
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status after transport retries.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The request was refused before or without reaching the wire.
    #[error("{0}")]
    Rejected(String),
}

/// All errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A page request failed; without it the listing is incomplete.
    #[error("pagination failed for {context} (page {page}): {source}")]
    Pagination {
        context: String,
        page: usize,
        #[source]
        source: ApiError,
    },

    /// The remote returned the cursor it was just given.
    #[error("pagination for {context} did not advance past cursor {cursor:?}")]
    StuckCursor { context: String, cursor: String },

    /// HTTP client construction failed.
    #[error("client setup failed: {0}")]
    Client(#[source] ApiError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (run record).
    #[error("run record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Render `err` followed by its `source()` chain, `: `-separated.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

// ---------------------------------------------------------------------------
// Per-item error records
// ---------------------------------------------------------------------------

/// What kind of non-fatal failure an [`ErrorRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Indirect identity resolution failed for one sink page.
    PropertyLookup,
    /// A page creation failed.
    Create,
    /// A page update failed.
    Update,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::PropertyLookup => write!(f, "property lookup"),
            ErrorKind::Create => write!(f, "create"),
            ErrorKind::Update => write!(f, "update"),
        }
    }
}

/// A failure local to one page or one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub collection: String,
    /// The page id or item URL the failure concerns.
    pub subject: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(
        kind: ErrorKind,
        collection: &str,
        subject: impl Into<String>,
        err: &dyn std::error::Error,
    ) -> Self {
        Self {
            kind,
            collection: collection.to_string(),
            subject: subject.into(),
            message: error_chain(err),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} failed for {}: {}",
            self.collection, self.kind, self.subject, self.message
        )
    }
}

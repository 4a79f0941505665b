//! # hubmirror-sync
//!
//! Reconciliation engine mirroring GitHub issues and pull requests into
//! Notion databases.
//!
//! Call [`pipeline::run`] for a configured, credentialed run against the real
//! services, or [`run_sync`] with any [`SourceApi`] / [`SinkApi`] pair.

pub mod batch;
pub mod error;
pub mod github;
pub mod identity;
pub mod index;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod notion;
mod paginate;
pub mod pipeline;
pub mod properties;
pub mod reconcile;
pub mod run_store;
pub mod sink;
pub mod source;
pub mod summary;
mod transport;

pub use batch::{BatchReport, BatchWriter};
pub use error::{ApiError, ErrorKind, ErrorRecord, SyncError};
pub use identity::{IdentityExtractor, IdentityMap, SinkRecord};
pub use index::{SinkIndex, SinkIndexBuilder};
pub use pipeline::{run_sync, RunOptions};
pub use properties::{FieldValue, PropertyMapper, PropertySet};
pub use reconcile::{reconcile, PendingUpdate, ReconcilePlan};
pub use sink::{PageProperty, SinkApi, SinkPage};
pub use source::{Page, SourceApi, SourceReader};
pub use summary::{CollectionSummary, SyncRunSummary};
pub use transport::RetryPolicy;

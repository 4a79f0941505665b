//! Run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hubmirror_core::{DatabaseId, IdentityStrategy};

use crate::error::ErrorRecord;

/// Counts for one collection of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collection: String,
    pub database_id: DatabaseId,
    pub identity: IdentityStrategy,
    /// Sink pages found by the index query.
    pub indexed: usize,
    /// Sink pages shadowed by an earlier page with the same identity.
    pub duplicates: usize,
    /// Sink pages without a usable identity.
    pub unresolved: usize,
    /// Items returned by the source.
    pub fetched: usize,
    pub planned_creates: usize,
    pub planned_updates: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Outcome of one run: write counts plus every non-fatal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<ErrorRecord>,
    pub collections: Vec<CollectionSummary>,
    #[serde(default)]
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncRunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            created: 0,
            updated: 0,
            errors: Vec::new(),
            collections: Vec::new(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Fold one collection's counts into the run totals.
    pub fn push(&mut self, collection: CollectionSummary, errors: Vec<ErrorRecord>) {
        self.created += collection.created;
        self.updated += collection.updated;
        self.errors.extend(errors);
        self.collections.push(collection);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when no per-item failure was recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn planned_creates(&self) -> usize {
        self.collections.iter().map(|c| c.planned_creates).sum()
    }

    pub fn planned_updates(&self) -> usize {
        self.collections.iter().map(|c| c.planned_updates).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorKind};

    #[test]
    fn push_accumulates_totals_and_errors() {
        let mut summary = SyncRunSummary::new(false);
        summary.push(
            CollectionSummary {
                collection: "issues".into(),
                created: 2,
                updated: 3,
                failed: 1,
                ..CollectionSummary::default()
            },
            vec![ErrorRecord::new(
                ErrorKind::Create,
                "issues",
                "u",
                &ApiError::Rejected("no".into()),
            )],
        );
        summary.push(
            CollectionSummary {
                collection: "pull_requests".into(),
                created: 1,
                ..CollectionSummary::default()
            },
            vec![],
        );
        assert_eq!(summary.created, 3);
        assert_eq!(summary.updated, 3);
        assert!(!summary.is_clean());
        assert_eq!(summary.collections.len(), 2);
    }

    #[test]
    fn summary_serializes_with_snake_case_error_kinds() {
        let mut summary = SyncRunSummary::new(true);
        summary.push(
            CollectionSummary::default(),
            vec![ErrorRecord::new(
                ErrorKind::PropertyLookup,
                "issues",
                "p",
                &ApiError::Rejected("gone".into()),
            )],
        );
        summary.finish();
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["errors"][0]["kind"], "property_lookup");
        assert_eq!(json["dry_run"], true);
        let back: SyncRunSummary = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, summary);
    }
}

//! Identity keys and the per-run identity map.

use std::collections::HashMap;

use hubmirror_core::{IdentityKey, IdentityStrategy, SinkPageId, SyncItem};

/// Derives the matching key of a source item.
pub trait IdentityExtractor {
    fn extract_identity(&self, item: &SyncItem) -> IdentityKey;
}

impl IdentityExtractor for IdentityStrategy {
    fn extract_identity(&self, item: &SyncItem) -> IdentityKey {
        match self {
            IdentityStrategy::Number => IdentityKey::Number(item.number),
            IdentityStrategy::Url => IdentityKey::Url(item.url.trim().to_string()),
        }
    }
}

/// Minimal projection of a stored sink page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub page_id: SinkPageId,
    pub identity: IdentityKey,
}

/// `identity key → sink page`, built once per run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    entries: HashMap<IdentityKey, SinkPageId>,
}

impl IdentityMap {
    /// Build from records in sink order. The first page seen for a key wins;
    /// later pages for the same key are returned as duplicates.
    pub fn from_records(
        records: impl IntoIterator<Item = SinkRecord>,
    ) -> (Self, Vec<SinkRecord>) {
        let mut entries = HashMap::new();
        let mut duplicates = Vec::new();
        for record in records {
            if entries.contains_key(&record.identity) {
                duplicates.push(record);
            } else {
                entries.insert(record.identity, record.page_id);
            }
        }
        (Self { entries }, duplicates)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&SinkPageId> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SinkRecord> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = SinkRecord>>(iter: I) -> Self {
        Self::from_records(iter).0
    }
}

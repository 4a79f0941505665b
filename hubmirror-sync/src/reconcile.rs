//! Partition fetched items into creates and updates.

use hubmirror_core::{SinkPageId, SyncItem};

use crate::identity::{IdentityExtractor, IdentityMap};

/// An item that already has a sink page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub item: SyncItem,
    pub page_id: SinkPageId,
}

/// Creates and updates for one collection, both in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_create: Vec<SyncItem>,
    pub to_update: Vec<PendingUpdate>,
}

impl ReconcilePlan {
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

/// Every item lands in exactly one of the two lists. Pure: no I/O.
pub fn reconcile<E: IdentityExtractor + ?Sized>(
    items: Vec<SyncItem>,
    map: &IdentityMap,
    extractor: &E,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    for item in items {
        let key = extractor.extract_identity(&item);
        match map.get(&key) {
            Some(page_id) => plan.to_update.push(PendingUpdate {
                page_id: page_id.clone(),
                item,
            }),
            None => plan.to_create.push(item),
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SinkRecord;
    use hubmirror_core::{IdentityKey, IdentityStrategy, ItemKind, ItemState};
    use proptest::prelude::*;

    fn item(number: u64) -> SyncItem {
        SyncItem {
            kind: ItemKind::Issue,
            number,
            title: format!("issue {number}"),
            state: ItemState::Open,
            url: format!("https://github.com/o/r/issues/{number}"),
            repository: Some("r".into()),
            author: "mona".into(),
            timestamp: None,
        }
    }

    fn map_of(entries: &[(u64, &str)]) -> IdentityMap {
        entries
            .iter()
            .map(|(n, page)| SinkRecord {
                page_id: SinkPageId::from(*page),
                identity: IdentityKey::Number(*n),
            })
            .collect()
    }

    #[test]
    fn known_item_is_updated_and_new_item_is_created() {
        let map = map_of(&[(101, "pageA")]);
        let plan = reconcile(vec![item(101), item(102)], &map, &IdentityStrategy::Number);

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].item.number, 101);
        assert_eq!(plan.to_update[0].page_id, SinkPageId::from("pageA"));
        assert_eq!(plan.to_create, vec![item(102)]);
    }

    #[test]
    fn empty_sink_creates_everything() {
        let plan = reconcile(
            vec![item(1), item(2)],
            &IdentityMap::default(),
            &IdentityStrategy::Url,
        );
        assert_eq!(plan.to_create.len(), 2);
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn strategy_decides_what_matches() {
        // Keyed by number; a url extractor must not see it.
        let map = map_of(&[(5, "p")]);
        let plan = reconcile(vec![item(5)], &map, &IdentityStrategy::Url);
        assert_eq!(plan.to_create.len(), 1);
    }

    proptest! {
        #[test]
        fn every_item_is_planned_exactly_once(
            numbers in proptest::collection::vec(0u64..50, 0..40),
            known in proptest::collection::btree_set(0u64..50, 0..20),
        ) {
            let map: IdentityMap = known
                .iter()
                .map(|n| SinkRecord {
                    page_id: SinkPageId::from(format!("page-{n}")),
                    identity: IdentityKey::Number(*n),
                })
                .collect();
            let items: Vec<SyncItem> = numbers.iter().copied().map(item).collect();
            let plan = reconcile(items, &map, &IdentityStrategy::Number);

            prop_assert_eq!(plan.len(), numbers.len());
            for update in &plan.to_update {
                prop_assert!(known.contains(&update.item.number));
                let expected = format!("page-{}", update.item.number);
                prop_assert_eq!(update.page_id.0.as_str(), expected.as_str());
            }
            for created in &plan.to_create {
                prop_assert!(!known.contains(&created.number));
            }
        }
    }
}

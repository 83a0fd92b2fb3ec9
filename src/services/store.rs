//! Item store seam
//!
//! The reasoner only reads items; persistence decisions stay with the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::KnowledgeItem;

/// Read-only access to knowledge items
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch an item by reference; `Ok(None)` if absent
    async fn get(&self, item_ref: &str) -> Result<Option<KnowledgeItem>>;
}

/// In-memory item store
#[derive(Default)]
pub struct InMemoryItemStore {
    items: RwLock<HashMap<String, KnowledgeItem>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of items
    pub fn from_items(items: impl IntoIterator<Item = KnowledgeItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert(item);
        }
        store
    }

    /// Insert or replace an item
    pub fn insert(&self, item: KnowledgeItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn get(&self, item_ref: &str) -> Result<Option<KnowledgeItem>> {
        Ok(self.items.read().get(item_ref).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_replace() {
        let store = InMemoryItemStore::from_items(vec![KnowledgeItem::new("n1").with_axis("a", 0.1)]);
        assert_eq!(store.len(), 1);

        store.insert(KnowledgeItem::new("n1").with_axis("a", 0.9));
        let item = store.get("n1").await.unwrap().unwrap();
        assert_eq!(item.axis_values["a"].values, vec![0.9]);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_blocking_lookup() {
        let store = InMemoryItemStore::from_items(vec![KnowledgeItem::new("n1")]);
        let found = tokio_test::block_on(store.get("n1"));
        assert!(tokio_test::assert_ok!(found).is_some());
    }
}

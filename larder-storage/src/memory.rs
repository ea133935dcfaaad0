//! In-memory keyed store for tests and local runs.
//!
//! Every mutation happens under one write lock, which gives the same
//! per-item atomicity the durable store provides. Faults can be injected
//! per operation to exercise fail-open callers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use larder_core::{LarderResult, StorageError};

use crate::{
    condition_failed, Item, ItemKey, KeyCondition, KeyedStore, PutCondition, TableSchema,
    UpdateExpression,
};

/// Store operations, used for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    Put,
    Update,
    Delete,
    Query,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    schema: TableSchema,
    items: RwLock<BTreeMap<ItemKey, Item>>,
    faults: RwLock<HashSet<StoreOperation>>,
    calls: RwLock<HashMap<StoreOperation, u64>>,
}

impl InMemoryStore {
    /// Create a store with the default schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store maintaining the given indexes.
    pub fn with_schema(schema: TableSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Make every subsequent call of `operation` fail with a backend error.
    pub fn fail_on(&self, operation: StoreOperation) {
        if let Ok(mut faults) = self.faults.write() {
            faults.insert(operation);
        }
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            faults.clear();
        }
    }

    /// Number of times `operation` has been invoked, failed calls included.
    pub fn call_count(&self, operation: StoreOperation) -> u64 {
        self.calls
            .read()
            .map(|calls| calls.get(&operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored items.
    pub fn clear(&self) {
        if let Ok(mut items) = self.items.write() {
            items.clear();
        }
    }

    fn enter(&self, operation: StoreOperation) -> LarderResult<()> {
        if let Ok(mut calls) = self.calls.write() {
            *calls.entry(operation).or_default() += 1;
        }
        let faulted = self
            .faults
            .read()
            .map(|faults| faults.contains(&operation))
            .unwrap_or(false);
        if faulted {
            return Err(StorageError::Backend {
                reason: format!("injected fault on {:?}", operation),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for InMemoryStore {
    async fn get(&self, key: &ItemKey) -> LarderResult<Option<Item>> {
        self.enter(StoreOperation::Get)?;
        let items = self.items.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn put(&self, item: Item, condition: PutCondition) -> LarderResult<()> {
        self.enter(StoreOperation::Put)?;
        let key = item.key()?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        if condition == PutCondition::IfNotExists && items.contains_key(&key) {
            return Err(condition_failed(&key, "item already exists").into());
        }
        items.insert(key, item);
        Ok(())
    }

    async fn update(&self, key: &ItemKey, update: &UpdateExpression) -> LarderResult<Item> {
        self.enter(StoreOperation::Update)?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        let item = items
            .get_mut(key)
            .ok_or_else(|| condition_failed(key, "item does not exist"))?;

        // Apply to a copy so a rejected expression leaves the item untouched
        let mut updated = item.clone();
        update.apply(&mut updated)?;
        *item = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, key: &ItemKey) -> LarderResult<()> {
        self.enter(StoreOperation::Delete)?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        items.remove(key);
        Ok(())
    }

    async fn query(
        &self,
        index_name: &str,
        condition: &KeyCondition,
        limit: usize,
    ) -> LarderResult<Vec<Item>> {
        self.enter(StoreOperation::Query)?;
        let index = self.schema.index(index_name)?;
        let items = self.items.read().map_err(|_| StorageError::LockPoisoned)?;

        let mut matched: Vec<(String, &ItemKey, &Item)> = items
            .iter()
            .filter_map(|(key, item)| {
                let (partition, sort) = index.entry(item)?;
                condition
                    .matches(&partition, &sort)
                    .then_some((sort, key, item))
            })
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        Ok(matched
            .into_iter()
            .take(limit)
            .map(|(_, _, item)| item.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GSI1, GSI1_PK, GSI1_SK};
    use larder_core::LarderError;
    use std::sync::Arc;

    fn indexed_item(id: &str, name: &str) -> Item {
        Item::new(&ItemKey::new(format!("INGREDIENT#{}", id), "METADATA"))
            .with(GSI1_PK, "INGREDIENT")
            .with(GSI1_SK, name)
            .with("usageCount", 1)
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = InMemoryStore::new();
        let item = indexed_item("ca-chua", "cà chua");
        let key = item.key().unwrap();

        store.put(item.clone(), PutCondition::Always).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(item));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryStore::new();
        let key = ItemKey::new("INGREDIENT#nothing", "METADATA");
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_if_not_exists() {
        let store = InMemoryStore::new();
        let item = indexed_item("ca-chua", "cà chua");

        store.put(item.clone(), PutCondition::IfNotExists).await.unwrap();
        let err = store
            .put(item, PutCondition::IfNotExists)
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
    }

    #[tokio::test]
    async fn test_update_missing_item_fails() {
        let store = InMemoryStore::new();
        let key = ItemKey::new("INGREDIENT#nothing", "METADATA");
        let err = store
            .update(&key, &UpdateExpression::new().add("usageCount", 1))
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_item_unchanged() {
        let store = InMemoryStore::new();
        let item = indexed_item("ca-chua", "cà chua");
        let key = item.key().unwrap();
        store.put(item.clone(), PutCondition::Always).await.unwrap();

        let bad = UpdateExpression::new().add("usageCount", 1).add(GSI1_SK, 1);
        assert!(store.update(&key, &bad).await.is_err());
        assert_eq!(store.get(&key).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_query_orders_by_sort_attribute_and_limits() {
        let store = InMemoryStore::new();
        for (id, name) in [("toi", "tỏi"), ("ca-chua", "cà chua"), ("gung", "gừng")] {
            store
                .put(indexed_item(id, name), PutCondition::Always)
                .await
                .unwrap();
        }
        store
            .put(
                Item::new(&ItemKey::new("CACHE#x", "ENTRY")),
                PutCondition::Always,
            )
            .await
            .unwrap();

        let all = store
            .query(GSI1, &KeyCondition::partition("INGREDIENT"), 10)
            .await
            .unwrap();
        let names: Vec<_> = all.iter().filter_map(|i| i.get_str(GSI1_SK)).collect();
        assert_eq!(names, vec!["cà chua", "gừng", "tỏi"]);

        let limited = store
            .query(GSI1, &KeyCondition::partition("INGREDIENT"), 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let prefixed = store
            .query(
                GSI1,
                &KeyCondition::partition("INGREDIENT").with_sort_prefix("g"),
                10,
            )
            .await
            .unwrap();
        assert_eq!(prefixed.len(), 1);
    }

    #[tokio::test]
    async fn test_query_unknown_index() {
        let store = InMemoryStore::new();
        let err = store
            .query("GSI9", &KeyCondition::partition("x"), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LarderError::Storage(StorageError::IndexNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fault_injection_and_call_counts() {
        let store = InMemoryStore::new();
        let key = ItemKey::new("a", "b");

        store.fail_on(StoreOperation::Get);
        assert!(store.get(&key).await.is_err());
        assert_eq!(store.call_count(StoreOperation::Get), 1);

        store.clear_faults();
        assert!(store.get(&key).await.is_ok());
        assert_eq!(store.call_count(StoreOperation::Get), 2);
        assert_eq!(store.call_count(StoreOperation::Query), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let item = indexed_item("ca-chua", "cà chua");
        let key = item.key().unwrap();
        store.put(item, PutCondition::Always).await.unwrap();

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        // deleting again is fine
        store.delete(&key).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryStore::new());
        let item = indexed_item("ca-chua", "cà chua");
        let key = item.key().unwrap();
        store.put(item, PutCondition::Always).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&key, &UpdateExpression::new().add("usageCount", 1))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.get_i64("usageCount"), Some(51));
    }
}

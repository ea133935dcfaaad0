//! Larder Storage - Keyed Store Trait and Implementations
//!
//! Defines the single-table store abstraction the ingredient vocabulary and
//! the cache share: point lookups, conditional puts, atomic in-place updates
//! and secondary-index queries. Ships an in-memory store for tests and an
//! LMDB-backed durable store.

pub mod cache;
pub mod lmdb;
pub mod memory;

pub use cache::{generate_key, CacheConfig, CacheStats, TtlCache};
pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::{InMemoryStore, StoreOperation};

use async_trait::async_trait;
use larder_core::{LarderResult, StorageError, ValidationError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partition key attribute.
pub const PK: &str = "PK";
/// Sort key attribute.
pub const SK: &str = "SK";
/// Name of the default secondary index.
pub const GSI1: &str = "GSI1";
/// Partition attribute of [`GSI1`].
pub const GSI1_PK: &str = "GSI1PK";
/// Sort attribute of [`GSI1`].
pub const GSI1_SK: &str = "GSI1SK";

// ============================================================================
// ITEMS
// ============================================================================

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

/// A stored record: a flat attribute map that always carries `PK` and `SK`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item {
    attributes: Map<String, Value>,
}

impl Item {
    /// Create an empty item with the given key.
    pub fn new(key: &ItemKey) -> Self {
        let mut attributes = Map::new();
        attributes.insert(PK.to_string(), Value::String(key.pk.clone()));
        attributes.insert(SK.to_string(), Value::String(key.sk.clone()));
        Self { attributes }
    }

    /// Build an item from a serializable record whose fields become attributes.
    pub fn from_record<T: Serialize>(key: &ItemKey, record: &T) -> LarderResult<Self> {
        let value = serde_json::to_value(record).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;
        let Value::Object(fields) = value else {
            return Err(StorageError::Serialization {
                reason: "record must serialize to an object".to_string(),
            }
            .into());
        };

        let mut item = Self::new(key);
        for (name, value) in fields {
            if name != PK && name != SK {
                item.attributes.insert(name, value);
            }
        }
        Ok(item)
    }

    /// Decode the item back into a record, ignoring key and index attributes.
    pub fn to_record<T: DeserializeOwned>(&self) -> LarderResult<T> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|e| {
            StorageError::Serialization {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Builder-style attribute assignment.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).and_then(Value::as_i64)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// The item's primary key.
    pub fn key(&self) -> LarderResult<ItemKey> {
        let pk = self.get_str(PK).ok_or_else(|| missing(PK))?;
        let sk = self.get_str(SK).ok_or_else(|| missing(SK))?;
        Ok(ItemKey::new(pk, sk))
    }
}

fn missing(field: &str) -> ValidationError {
    ValidationError::RequiredFieldMissing {
        field: field.to_string(),
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Precondition for [`KeyedStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutCondition {
    /// Overwrite any existing item.
    #[default]
    Always,
    /// Fail with `ConditionFailed` if the key is taken.
    IfNotExists,
}

/// Atomic in-place mutation applied by [`KeyedStore::update`].
///
/// `ADD` increments numeric attributes (missing attributes start at 0),
/// `SET` assigns values. Both are applied to the stored item in one step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateExpression {
    add: Vec<(String, i64)>,
    set: Vec<(String, Value)>,
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, delta: i64) -> Self {
        self.add.push((name.into(), delta));
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.set.is_empty()
    }

    /// Apply the expression to an item.
    ///
    /// Key attributes cannot be modified and `ADD` only applies to integers.
    pub fn apply(&self, item: &mut Item) -> LarderResult<()> {
        for name in self.add.iter().map(|(n, _)| n).chain(self.set.iter().map(|(n, _)| n)) {
            if name == PK || name == SK {
                return Err(ValidationError::InvalidValue {
                    field: name.clone(),
                    reason: "key attributes are immutable".to_string(),
                }
                .into());
            }
        }

        for (name, delta) in &self.add {
            let current = match item.get(name) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| ValidationError::InvalidValue {
                    field: name.clone(),
                    reason: format!("ADD requires an integer attribute, found {}", value),
                })?,
            };
            let next = current.checked_add(*delta).ok_or_else(|| ValidationError::InvalidValue {
                field: name.clone(),
                reason: "integer overflow".to_string(),
            })?;
            item.set(name.clone(), next);
        }

        for (name, value) in &self.set {
            item.set(name.clone(), value.clone());
        }

        Ok(())
    }
}

/// Key condition for an index query: exact partition, optional sort prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition: String,
    pub sort_prefix: Option<String>,
}

impl KeyCondition {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort_prefix: None,
        }
    }

    pub fn with_sort_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sort_prefix = Some(prefix.into());
        self
    }

    /// True when an index entry `(partition, sort)` satisfies the condition.
    pub fn matches(&self, partition: &str, sort: &str) -> bool {
        partition == self.partition
            && self
                .sort_prefix
                .as_deref()
                .map_or(true, |prefix| sort.starts_with(prefix))
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// A secondary index over two item attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub partition_attr: String,
    pub sort_attr: String,
}

impl IndexDefinition {
    pub fn new(
        name: impl Into<String>,
        partition_attr: impl Into<String>,
        sort_attr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_attr: partition_attr.into(),
            sort_attr: sort_attr.into(),
        }
    }

    /// The `(partition, sort)` entry this item projects into the index.
    ///
    /// Items without a string partition attribute are not indexed; a
    /// missing sort attribute sorts as the empty string.
    pub fn entry(&self, item: &Item) -> Option<(String, String)> {
        let partition = item.get_str(&self.partition_attr)?;
        let sort = item.get_str(&self.sort_attr).unwrap_or_default();
        Some((partition.to_string(), sort.to_string()))
    }
}

/// Secondary indexes maintained by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    indexes: Vec<IndexDefinition>,
}

impl TableSchema {
    pub fn new(indexes: Vec<IndexDefinition>) -> Self {
        Self { indexes }
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> LarderResult<&IndexDefinition> {
        self.indexes
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| {
                StorageError::IndexNotFound {
                    index_name: name.to_string(),
                }
                .into()
            })
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::new(vec![IndexDefinition::new(GSI1, GSI1_PK, GSI1_SK)])
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable key-value store with secondary-index queries.
///
/// Implementations must make `put` and `update` atomic per item: concurrent
/// `ADD` updates against one key never lose increments.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Point lookup by primary key.
    async fn get(&self, key: &ItemKey) -> LarderResult<Option<Item>>;

    /// Write an item, subject to `condition`.
    async fn put(&self, item: Item, condition: PutCondition) -> LarderResult<()>;

    /// Atomically apply `update` to an existing item and return the result.
    ///
    /// Fails with `ConditionFailed` when the item does not exist.
    async fn update(&self, key: &ItemKey, update: &UpdateExpression) -> LarderResult<Item>;

    /// Remove an item. Removing a missing item is not an error.
    async fn delete(&self, key: &ItemKey) -> LarderResult<()>;

    /// Query a secondary index, ordered by the index sort attribute.
    async fn query(
        &self,
        index_name: &str,
        condition: &KeyCondition,
        limit: usize,
    ) -> LarderResult<Vec<Item>>;
}

pub(crate) fn condition_failed(key: &ItemKey, reason: &str) -> StorageError {
    StorageError::ConditionFailed {
        pk: key.pk.clone(),
        sk: key.sk.clone(),
        reason: reason.to_string(),
    }
}

//! LMDB-backed keyed store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a durable, memory-mapped
//! single-table store. Two named databases live in one environment:
//!
//! - `items`: `PK ; SK` → JSON-encoded [`Item`]
//! - `idx`: `index ; partition ; sort ; PK ; SK` → `PK ; SK`
//!
//! where `;` is the two-byte terminator `00 01`. A NUL inside a segment is
//! escaped as `00 FF`, which UTF-8 never produces, so any string is a valid
//! key segment and escaped segments still sort like the strings they encode.
//!
//! # Atomicity
//!
//! LMDB serializes write transactions, so every `put`, `update` and `delete`
//! reads the current item, rewrites it and maintains its index entries inside
//! one write transaction. Concurrent `ADD` updates therefore never lose
//! increments. Because index keys are ordered bytewise, a prefix scan returns
//! entries ordered by the index sort attribute.
//!
//! # Blocking
//!
//! Transactions run inline on the calling task. A write waits on LMDB's
//! single writer lock, so under contention the async methods block the
//! executor thread until the lock is free. Prefer a multi-thread runtime
//! when many tasks write concurrently.

use std::path::Path;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use larder_core::{LarderError, LarderResult, StorageError};

use crate::{
    condition_failed, IndexDefinition, Item, ItemKey, KeyCondition, KeyedStore, PutCondition,
    TableSchema, UpdateExpression,
};

const ESCAPE: u8 = 0x00;
const TERMINATOR: [u8; 2] = [ESCAPE, 0x01];
const ESCAPED_NUL: [u8; 2] = [ESCAPE, 0xFF];
const ITEMS_DB: &str = "items";
const INDEX_DB: &str = "idx";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for LarderError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(reason) | LmdbStoreError::Deserialization(reason) => {
                LarderError::Storage(StorageError::Serialization { reason })
            }
            other => LarderError::Storage(StorageError::Backend {
                reason: other.to_string(),
            }),
        }
    }
}

fn txn_error(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// Durable keyed store on LMDB.
///
/// Operations are synchronous LMDB transactions wrapped in async methods;
/// writers serialize on the environment's write lock.
///
/// # Example
///
/// ```ignore
/// use larder_storage::{Item, ItemKey, KeyedStore, LmdbStore, PutCondition};
///
/// let store = LmdbStore::open("/var/lib/larder", 64)?;
/// let key = ItemKey::new("INGREDIENT#ca-chua", "METADATA");
/// store.put(Item::new(&key), PutCondition::IfNotExists).await?;
/// ```
pub struct LmdbStore {
    env: Env,
    items: Database<Bytes, Bytes>,
    index: Database<Bytes, Bytes>,
    schema: TableSchema,
}

impl LmdbStore {
    /// Open (or create) a store with the default schema.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        Self::open_with_schema(path, max_size_mb, TableSchema::default())
    }

    /// Open (or create) a store maintaining the given indexes.
    ///
    /// Index entries are written on every mutation; opening an existing
    /// environment with a different schema does not backfill old items.
    pub fn open_with_schema<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        schema: TableSchema,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(2)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let items: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(ITEMS_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        let index: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(INDEX_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "opened lmdb store");

        Ok(Self {
            env,
            items,
            index,
            schema,
        })
    }

    fn read_item(&self, txn: &RoTxn, encoded_key: &[u8]) -> LarderResult<Option<Item>> {
        match self.items.get(txn, encoded_key).map_err(txn_error)? {
            Some(bytes) => {
                let item = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn index_keys(&self, key: &ItemKey, item: &Item) -> Vec<Vec<u8>> {
        self.schema
            .indexes()
            .iter()
            .filter_map(|index| index.entry(item).map(|entry| (index, entry)))
            .map(|(index, (partition, sort))| index_key(index, &partition, &sort, key))
            .collect()
    }

    /// Replace the stored item (if any) and its index entries within `wtxn`.
    fn write_item(
        &self,
        wtxn: &mut RwTxn,
        key: &ItemKey,
        previous: Option<&Item>,
        next: Option<&Item>,
    ) -> LarderResult<()> {
        let encoded_key = encode_key(key);

        if let Some(previous) = previous {
            for entry in self.index_keys(key, previous) {
                self.index.delete(wtxn, &entry).map_err(txn_error)?;
            }
        }

        match next {
            Some(item) => {
                let bytes = serde_json::to_vec(item)
                    .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
                self.items
                    .put(wtxn, &encoded_key, &bytes)
                    .map_err(txn_error)?;
                for entry in self.index_keys(key, item) {
                    self.index
                        .put(wtxn, &entry, &encoded_key)
                        .map_err(txn_error)?;
                }
            }
            None => {
                self.items.delete(wtxn, &encoded_key).map_err(txn_error)?;
            }
        }
        Ok(())
    }

    fn get_sync(&self, key: &ItemKey) -> LarderResult<Option<Item>> {
        let encoded_key = encode_key(key);
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        self.read_item(&rtxn, &encoded_key)
    }

    fn put_sync(&self, item: Item, condition: PutCondition) -> LarderResult<()> {
        let key = item.key()?;
        let encoded_key = encode_key(&key);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let previous = self.read_item(&wtxn, &encoded_key)?;
        if condition == PutCondition::IfNotExists && previous.is_some() {
            // Dropping the transaction aborts it
            return Err(condition_failed(&key, "item already exists").into());
        }
        self.write_item(&mut wtxn, &key, previous.as_ref(), Some(&item))?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn update_sync(&self, key: &ItemKey, update: &UpdateExpression) -> LarderResult<Item> {
        let encoded_key = encode_key(key);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let previous = self
            .read_item(&wtxn, &encoded_key)?
            .ok_or_else(|| condition_failed(key, "item does not exist"))?;

        let mut next = previous.clone();
        update.apply(&mut next)?;
        self.write_item(&mut wtxn, key, Some(&previous), Some(&next))?;
        wtxn.commit().map_err(txn_error)?;
        Ok(next)
    }

    fn delete_sync(&self, key: &ItemKey) -> LarderResult<()> {
        let encoded_key = encode_key(key);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        if let Some(previous) = self.read_item(&wtxn, &encoded_key)? {
            self.write_item(&mut wtxn, key, Some(&previous), None)?;
        }
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn query_sync(
        &self,
        index_name: &str,
        condition: &KeyCondition,
        limit: usize,
    ) -> LarderResult<Vec<Item>> {
        let index = self.schema.index(index_name)?;
        let mut prefix = Vec::new();
        push_segment(&mut prefix, &index.name);
        push_segment(&mut prefix, &condition.partition);
        if let Some(sort_prefix) = &condition.sort_prefix {
            // Unterminated, so it matches every sort value it begins
            push_escaped(&mut prefix, sort_prefix);
        }

        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entries = self
            .index
            .prefix_iter(&rtxn, &prefix)
            .map_err(|e| StorageError::IndexError {
                index_name: index_name.to_string(),
                reason: e.to_string(),
            })?;

        let mut results = Vec::new();
        for entry in entries {
            if results.len() >= limit {
                break;
            }
            let (_, item_key) = entry.map_err(txn_error)?;
            match self.read_item(&rtxn, item_key)? {
                Some(item) => results.push(item),
                None => tracing::warn!(
                    index = %index_name,
                    "index entry points at a missing item"
                ),
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl KeyedStore for LmdbStore {
    async fn get(&self, key: &ItemKey) -> LarderResult<Option<Item>> {
        self.get_sync(key)
    }

    async fn put(&self, item: Item, condition: PutCondition) -> LarderResult<()> {
        self.put_sync(item, condition)
    }

    async fn update(&self, key: &ItemKey, update: &UpdateExpression) -> LarderResult<Item> {
        self.update_sync(key, update)
    }

    async fn delete(&self, key: &ItemKey) -> LarderResult<()> {
        self.delete_sync(key)
    }

    async fn query(
        &self,
        index_name: &str,
        condition: &KeyCondition,
        limit: usize,
    ) -> LarderResult<Vec<Item>> {
        self.query_sync(index_name, condition, limit)
    }
}

// ============================================================================
// KEY ENCODING
// ============================================================================

fn push_escaped(buf: &mut Vec<u8>, value: &str) {
    for &byte in value.as_bytes() {
        if byte == ESCAPE {
            buf.extend_from_slice(&ESCAPED_NUL);
        } else {
            buf.push(byte);
        }
    }
}

fn push_segment(buf: &mut Vec<u8>, value: &str) {
    push_escaped(buf, value);
    buf.extend_from_slice(&TERMINATOR);
}

fn encode_key(key: &ItemKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key.pk.len() + key.sk.len() + TERMINATOR.len());
    push_segment(&mut buf, &key.pk);
    push_escaped(&mut buf, &key.sk);
    buf
}

fn index_key(index: &IndexDefinition, partition: &str, sort: &str, key: &ItemKey) -> Vec<u8> {
    let mut buf = Vec::new();
    push_segment(&mut buf, &index.name);
    push_segment(&mut buf, partition);
    push_segment(&mut buf, sort);
    buf.extend_from_slice(&encode_key(key));
    buf
}

//! TTL cache service.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use larder_core::LarderResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CacheConfig, CacheStats};
use crate::{Item, ItemKey, KeyedStore, PutCondition};

/// Sort key of every cache item.
pub const CACHE_SORT_KEY: &str = "ENTRY";
/// Attribute holding the cached JSON payload.
pub const DATA_ATTR: &str = "data";
/// Attribute holding the RFC 3339 expiry instant.
pub const EXPIRES_AT_ATTR: &str = "expiresAt";
/// Attribute holding the expiry as epoch seconds, for store-side expiry.
pub const TTL_ATTR: &str = "ttl";

/// Best-effort cache of JSON payloads with per-entry expiry.
///
/// Constructed explicitly around a shared store; independent instances may
/// use different namespaces over the same store.
pub struct TtlCache<S: KeyedStore> {
    store: Arc<S>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl<S: KeyedStore> TtlCache<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Snapshot of the hit/miss/error counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn item_key(&self, key: &str) -> ItemKey {
        ItemKey::new(format!("{}#{}", self.config.namespace, key), CACHE_SORT_KEY)
    }

    fn miss<T>(&self) -> Option<T> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Read a live entry. Missing, expired, unreadable and errored reads
    /// all return `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let item = match self.store.get(&self.item_key(key)).await {
            Ok(Some(item)) => item,
            Ok(None) => return self.miss(),
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(cache_key = %key, error = %e, "cache get failed");
                return self.miss();
            }
        };

        let expires_at = item
            .get_str(EXPIRES_AT_ATTR)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc));
        let Some(expires_at) = expires_at else {
            tracing::warn!(cache_key = %key, "cache entry has no readable expiry");
            return self.miss();
        };
        if Utc::now() > expires_at {
            tracing::debug!(cache_key = %key, %expires_at, "cache entry expired");
            return self.miss();
        }

        let Some(data) = item.get(DATA_ATTR) else {
            return self.miss();
        };
        match serde_json::from_value(data.clone()) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "cache payload has unexpected shape");
                self.miss()
            }
        }
    }

    /// Store `data` for `ttl_seconds` (or the configured default).
    ///
    /// Non-positive TTLs are written as already expired. Failures are logged
    /// and otherwise ignored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl_seconds: Option<i64>) {
        let payload = match serde_json::to_value(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "cache payload not serializable");
                return;
            }
        };

        let ttl = ttl_seconds
            .unwrap_or_else(|| i64::try_from(self.config.default_ttl.as_secs()).unwrap_or(i64::MAX));
        let Some(expires_at) =
            TimeDelta::try_seconds(ttl).and_then(|delta| Utc::now().checked_add_signed(delta))
        else {
            tracing::warn!(cache_key = %key, ttl, "cache ttl out of range, entry not written");
            return;
        };

        let item = Item::new(&self.item_key(key))
            .with(DATA_ATTR, payload)
            .with(EXPIRES_AT_ATTR, expires_at.to_rfc3339())
            .with(TTL_ATTR, expires_at.timestamp());

        if let Err(e) = self.store.put(item, PutCondition::Always).await {
            self.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(cache_key = %key, error = %e, "cache set failed");
        }
    }

    /// Remove an entry. Failures are logged and otherwise ignored.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(&self.item_key(key)).await {
            self.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(cache_key = %key, error = %e, "cache delete failed");
        }
    }

    /// Return the cached value, or compute, cache and return it.
    ///
    /// Errors from `compute` propagate and nothing is cached for them.
    pub async fn get_or_set_with<T, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: Option<i64>,
        compute: F,
    ) -> LarderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = LarderResult<T>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let value = compute().await?;
        self.set(key, &value, ttl_seconds).await;
        Ok(value)
    }
}

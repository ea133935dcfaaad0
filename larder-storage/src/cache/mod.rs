//! Fail-open TTL cache layered over a [`KeyedStore`](crate::KeyedStore).
//!
//! Caching is an optimization over a system that is correct without it, so
//! reads and writes never surface store failures: a failed or expired read
//! is a miss and a failed write is as if it never happened. Only key
//! generation reports errors, and only for parameters that cannot be
//! serialized.
//!
//! # Example
//!
//! ```ignore
//! let cache = TtlCache::new(store.clone(), CacheConfig::default());
//! let key = generate_key("recipe-feed", &json!({"page": 2, "user": "u1"}))?;
//!
//! if let Some(feed) = cache.get::<Vec<String>>(&key).await {
//!     return Ok(feed);
//! }
//! cache.set(&key, &feed, Some(300)).await;
//! ```

pub mod key;
pub mod ttl;

pub use key::generate_key;
pub use ttl::TtlCache;

use larder_core::{LarderConfig, DEFAULT_CACHE_TTL};
use std::time::Duration;

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one.
    pub default_ttl: Duration,
    /// Partition prefix for cache items (`<namespace>#<key>`).
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            namespace: "CACHE".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the partition namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl From<&LarderConfig> for CacheConfig {
    fn from(config: &LarderConfig) -> Self {
        Self::default().with_default_ttl(config.cache_default_ttl)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that returned a live entry.
    pub hits: u64,
    /// Reads that found nothing, an expired entry or an unreadable payload.
    pub misses: u64,
    /// Store failures swallowed by reads and writes.
    pub errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_cache_config_from_larder_config() {
        let larder = LarderConfig::new().with_cache_ttl(Duration::from_secs(90));
        let config = CacheConfig::from(&larder);
        assert_eq!(config.default_ttl, Duration::from_secs(90));
        assert_eq!(config.namespace, "CACHE");
    }
}

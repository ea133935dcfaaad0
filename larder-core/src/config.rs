//! Configuration types

use crate::category::CategoryTable;
use crate::error::{ConfigError, LarderError, LarderResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default near-duplicate threshold. Below it distinct ingredients start
/// merging; above it spelling variants proliferate as separate entries.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.90;

/// Default cap on index entries scanned per similarity search.
pub const DEFAULT_SIMILARITY_SCAN_LIMIT: usize = 100;

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Runtime configuration for the ingredient vocabulary and cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LarderConfig {
    /// Similarity at or above which two names are the same ingredient.
    pub dedup_threshold: f64,
    /// Maximum master entries compared per similarity search.
    pub similarity_scan_limit: usize,
    /// TTL applied by the cache when the caller gives none.
    pub cache_default_ttl: Duration,
    /// Deadline for a single save; `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
    /// Ordered keyword table used by the categorizer.
    pub category_rules: CategoryTable,
}

impl Default for LarderConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            similarity_scan_limit: DEFAULT_SIMILARITY_SCAN_LIMIT,
            cache_default_ttl: DEFAULT_CACHE_TTL,
            operation_timeout: None,
            category_rules: CategoryTable::default(),
        }
    }
}

impl LarderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.similarity_scan_limit = limit;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_default_ttl = ttl;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn with_category_rules(mut self, rules: CategoryTable) -> Self {
        self.category_rules = rules;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LARDER_DEDUP_THRESHOLD`: similarity threshold in `[0, 1]` (default: 0.90)
    /// - `LARDER_SIMILARITY_SCAN_LIMIT`: entries scanned per search (default: 100)
    /// - `LARDER_CACHE_TTL_SECS`: default cache TTL (default: 3600)
    /// - `LARDER_OPERATION_TIMEOUT_MS`: per-save deadline (default: none)
    /// - `LARDER_CATEGORY_RULES_PATH`: JSON category table (default: built-in)
    pub fn from_env() -> LarderResult<Self> {
        let mut config = Self::default();

        if let Some(threshold) = parse_env::<f64>("LARDER_DEDUP_THRESHOLD")? {
            config.dedup_threshold = threshold;
        }
        if let Some(limit) = parse_env::<usize>("LARDER_SIMILARITY_SCAN_LIMIT")? {
            config.similarity_scan_limit = limit;
        }
        if let Some(secs) = parse_env::<u64>("LARDER_CACHE_TTL_SECS")? {
            config.cache_default_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env::<u64>("LARDER_OPERATION_TIMEOUT_MS")? {
            config.operation_timeout = Some(Duration::from_millis(ms));
        }
        if let Ok(path) = std::env::var("LARDER_CATEGORY_RULES_PATH") {
            let json = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            config.category_rules = CategoryTable::from_json(&json)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - dedup_threshold in [0.0, 1.0]
    /// - similarity_scan_limit > 0
    /// - operation_timeout, when set, is positive
    pub fn validate(&self) -> LarderResult<()> {
        if !(0.0..=1.0).contains(&self.dedup_threshold) {
            return Err(invalid(
                "dedup_threshold",
                self.dedup_threshold.to_string(),
                "dedup_threshold must be between 0.0 and 1.0",
            ));
        }

        if self.similarity_scan_limit == 0 {
            return Err(invalid(
                "similarity_scan_limit",
                "0".to_string(),
                "similarity_scan_limit must be greater than 0",
            ));
        }

        if let Some(timeout) = self.operation_timeout {
            if timeout.is_zero() {
                return Err(invalid(
                    "operation_timeout",
                    format!("{:?}", timeout),
                    "operation_timeout must be positive",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> LarderError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    }
    .into()
}

fn parse_env<T: std::str::FromStr>(name: &str) -> LarderResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, raw.clone(), &e.to_string())),
        Err(_) => Ok(None),
    }
}

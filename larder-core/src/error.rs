//! Error types for Larder operations

use std::time::Duration;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Item not found: {pk}/{sk}")]
    NotFound { pk: String, sk: String },

    #[error("Condition failed for {pk}/{sk}: {reason}")]
    ConditionFailed {
        pk: String,
        sk: String,
        reason: String,
    },

    #[error("Backend error: {reason}")]
    Backend { reason: String },

    #[error("Index not found: {index_name}")]
    IndexNotFound { index_name: String },

    #[error("Index error on {index_name}: {reason}")]
    IndexError { index_name: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// True when the store rejected a conditional write.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed { .. })
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Cache errors. Only key generation surfaces these; reads and writes fail open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache key parameters for prefix {prefix} are not serializable: {reason}")]
    KeySerialization { prefix: String, reason: String },
}

/// Master error type for all Larder errors.
#[derive(Debug, Clone, Error)]
pub enum LarderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl LarderError {
    /// True when this error is a rejected conditional write.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_condition_failed())
    }
}

/// Result type alias for Larder operations.
pub type LarderResult<T> = Result<T, LarderError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            pk: "INGREDIENT#ca-chua".to_string(),
            sk: "METADATA".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Item not found"));
        assert!(msg.contains("INGREDIENT#ca-chua"));
    }

    #[test]
    fn test_condition_failed_detection() {
        let err: LarderError = StorageError::ConditionFailed {
            pk: "p".to_string(),
            sk: "s".to_string(),
            reason: "item already exists".to_string(),
        }
        .into();
        assert!(err.is_condition_failed());

        let other: LarderError = StorageError::LockPoisoned.into();
        assert!(!other.is_condition_failed());
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "dedup_threshold".to_string(),
            value: "1.5".to_string(),
            reason: "must be within [0, 1]".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("dedup_threshold"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_timeout_display() {
        let err = LarderError::Timeout {
            operation: "save_ingredient".to_string(),
            after: Duration::from_millis(250),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("save_ingredient"));
        assert!(msg.contains("250ms"));
    }

    #[test]
    fn test_master_error_wraps_cache_error() {
        let err: LarderError = CacheError::KeySerialization {
            prefix: "recipes".to_string(),
            reason: "key must be a string".to_string(),
        }
        .into();
        assert!(matches!(err, LarderError::Cache(_)));
        assert!(format!("{}", err).contains("recipes"));
    }
}

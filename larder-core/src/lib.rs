//! Larder Core - Ingredient Vocabulary Types
//!
//! Data types, error taxonomy, configuration and the pure text functions
//! behind the master ingredient vocabulary: normalization, identifier
//! derivation, categorization and similarity scoring. Nothing here touches
//! storage; the store-backed dedup logic lives in larder-ingredients.

pub mod category;
pub mod config;
pub mod error;
pub mod similarity;
pub mod text;

pub use category::{CategoryRule, CategoryTable, IngredientCategory};
pub use config::{
    LarderConfig, DEFAULT_CACHE_TTL, DEFAULT_DEDUP_THRESHOLD, DEFAULT_SIMILARITY_SCAN_LIMIT,
};
pub use error::{
    CacheError, ConfigError, LarderError, LarderResult, StorageError, ValidationError,
};
pub use similarity::{rank_matches, similarity};
pub use text::{generate_id, normalize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// ENTITIES
// ============================================================================

/// Canonical, deduplicated vocabulary entry for one real-world ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterIngredient {
    /// Slug derived from `name`; primary key.
    pub id: String,
    /// Normalized display name.
    pub name: String,
    pub category: IngredientCategory,
    /// References accepted so far; starts at 1.
    pub usage_count: u64,
    /// Source record that created the entry.
    pub first_used_in: String,
    /// Most recent source record referencing the entry.
    pub last_used_in: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MasterIngredient {
    /// Create a first-use entry from an already normalized name.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: IngredientCategory,
        source_id: impl Into<String>,
    ) -> Self {
        let source_id = source_id.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            category,
            usage_count: 1,
            first_used_in: source_id.clone(),
            last_used_in: source_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A vocabulary entry scored against a query name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarIngredient {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Result of resolving a raw name against the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub id: String,
    pub is_new: bool,
}

impl SaveOutcome {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_new: true,
        }
    }

    pub fn reused(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_new: false,
        }
    }
}

//! Larder Test Utilities
//!
//! Shared test infrastructure for the Larder workspace:
//! - Proptest generators for raw ingredient names and categories
//! - Test fixtures for common scenarios
//! - Custom assertions for Larder error variants

// Re-export the in-memory store from its source crate
pub use larder_storage::{InMemoryStore, KeyedStore, StoreOperation};

// Re-export core types for convenience
pub use larder_core::{
    generate_id, normalize, similarity, CategoryRule, CategoryTable, IngredientCategory,
    LarderConfig, LarderError, LarderResult, MasterIngredient, SaveOutcome, SimilarIngredient,
    StorageError, Timestamp, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for ingredient names and categories.

    use super::*;
    use proptest::prelude::*;

    /// Vocabulary the name generator draws from.
    pub const INGREDIENT_WORDS: &[&str] = &[
        "thịt", "bò", "heo", "gà", "cá", "tôm", "cà", "chua", "hành", "tây", "tỏi", "gừng",
        "rau", "muống", "mùi", "sả", "ớt", "nước", "mắm", "đường", "bún", "sữa", "đậu", "phụ",
        "beef", "onion", "garlic", "tomato", "basil", "rice", "butter",
    ];

    /// A normalized ingredient name: one to four vocabulary words.
    pub fn arb_ingredient_name() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(INGREDIENT_WORDS), 1..=4)
            .prop_map(|words| words.join(" "))
    }

    /// A raw name as users type it: random case, padding and doubled spaces.
    pub fn arb_raw_ingredient_name() -> impl Strategy<Value = String> {
        (
            prop::collection::vec((prop::sample::select(INGREDIENT_WORDS), any::<bool>()), 1..=4),
            "[ \t]{0,3}",
            "[ \t]{0,3}",
            1usize..=3,
        )
            .prop_map(|(words, lead, trail, gap)| {
                let words: Vec<String> = words
                    .into_iter()
                    .map(|(w, upper)| if upper { w.to_uppercase() } else { w.to_string() })
                    .collect();
                format!("{}{}{}", lead, words.join(&" ".repeat(gap)), trail)
            })
    }

    /// Arbitrary Unicode text, including whitespace-only and empty strings.
    pub fn arb_any_text() -> impl Strategy<Value = String> {
        prop_oneof![
            "\\PC{0,24}",
            "[ \t\n]{0,5}",
            arb_raw_ingredient_name(),
        ]
    }

    /// Generate an IngredientCategory variant.
    pub fn arb_category() -> impl Strategy<Value = IngredientCategory> {
        prop::sample::select(IngredientCategory::ALL.to_vec())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// A first-use master entry for `raw_name`, derived the way the
    /// normalizer derives it.
    pub fn make_master_ingredient(raw_name: &str, source_id: &str) -> MasterIngredient {
        let name = normalize(raw_name);
        let category = CategoryTable::default().categorize(&name);
        MasterIngredient::new(generate_id(&name), name, category, source_id)
    }

    /// A small category table for tests that need a custom taxonomy.
    pub fn tiny_category_table() -> CategoryTable {
        CategoryTable::new(vec![
            CategoryRule::new(IngredientCategory::Protein, ["thịt", "beef"]),
            CategoryRule::new(IngredientCategory::Herb, ["húng"]),
        ])
    }

    /// Configuration used by most integration tests.
    pub fn test_config() -> LarderConfig {
        LarderConfig::default()
    }

    pub fn memory_store() -> std::sync::Arc<InMemoryStore> {
        std::sync::Arc::new(InMemoryStore::new())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Larder-specific results.

    use super::*;

    /// Assert that a LarderResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &LarderResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a LarderResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &LarderResult<T>) {
        match result {
            Err(LarderError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a LarderResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &LarderResult<T>) {
        match result {
            Err(LarderError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a LarderResult is a Timeout error.
    #[track_caller]
    pub fn assert_timeout<T: std::fmt::Debug>(result: &LarderResult<T>) {
        match result {
            Err(LarderError::Timeout { .. }) => {}
            other => panic!("Expected Timeout error, got: {:?}", other),
        }
    }

    /// Assert that a slug only uses `[a-z0-9-]`.
    #[track_caller]
    pub fn assert_slug(id: &str) {
        assert!(
            id.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "Not a slug: {:?}",
            id
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_make_master_ingredient_fixture() {
        let ingredient = fixtures::make_master_ingredient("  THỊT BÒ ", "recipe-1");
        assert_eq!(ingredient.id, "thit-bo");
        assert_eq!(ingredient.name, "thịt bò");
        assert_eq!(ingredient.category, IngredientCategory::Protein);
        assert_eq!(ingredient.usage_count, 1);
    }

    #[test]
    fn test_tiny_category_table() {
        let table = fixtures::tiny_category_table();
        assert_eq!(table.categorize("húng quế"), IngredientCategory::Herb);
        assert_eq!(table.categorize("cà chua"), IngredientCategory::Other);
    }

    #[test]
    fn test_test_config_is_valid() {
        assertions::assert_ok(&fixtures::test_config().validate());
    }

    #[tokio::test]
    async fn test_memory_store_fixture_starts_empty() {
        let store = fixtures::memory_store();
        assert!(store.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_raw_names_normalize_to_vocabulary_words(raw in generators::arb_raw_ingredient_name()) {
            let normalized = normalize(&raw);
            prop_assert!(!normalized.is_empty());
            for word in normalized.split(' ') {
                prop_assert!(generators::INGREDIENT_WORDS.contains(&word), "{:?}", word);
            }
        }

        #[test]
        fn prop_generated_ids_are_slugs(raw in generators::arb_any_text()) {
            assertions::assert_slug(&generate_id(&raw));
        }

        #[test]
        fn prop_category_strategy_covers_labels(category in generators::arb_category()) {
            prop_assert_eq!(category.as_str().parse::<IngredientCategory>().unwrap(), category);
        }
    }
}

//! Dedup/upsert orchestration over the master ingredient vocabulary.

use std::sync::Arc;

use chrono::Utc;
use larder_core::{
    generate_id, normalize, rank_matches, IngredientCategory, LarderConfig, LarderError,
    LarderResult, MasterIngredient, SaveOutcome, SimilarIngredient, ValidationError,
};
use larder_storage::{KeyedStore, PutCondition, GSI1};

use crate::records::{
    all_ingredients, candidate, ingredient_from_item, ingredient_item, ingredient_key,
    usage_update, USAGE_COUNT_ATTR,
};

/// Resolves raw ingredient names to master vocabulary entries.
///
/// Each call runs lookup, optional similarity scan and create/increment
/// sequentially against the shared store. No lock spans the lookup-then-create
/// sequence: two concurrent callers with near-duplicate, not yet stored names
/// can both create an entry. Only exact-id creation is guarded, by a
/// conditional put.
pub struct IngredientNormalizer<S: KeyedStore> {
    store: Arc<S>,
    config: LarderConfig,
}

impl<S: KeyedStore> IngredientNormalizer<S> {
    /// Create a normalizer with the default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: LarderConfig::default(),
        }
    }

    /// Create a normalizer with a validated configuration.
    pub fn with_config(store: Arc<S>, config: LarderConfig) -> LarderResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &LarderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw)
    }

    pub fn generate_id(&self, raw: &str) -> String {
        generate_id(raw)
    }

    /// Categorize with the configured keyword table.
    pub fn categorize(&self, raw: &str) -> IngredientCategory {
        self.config.category_rules.categorize(raw)
    }

    /// Master entries whose names score at or above `threshold` (default:
    /// the configured dedup threshold) against `name`, best first.
    ///
    /// Scans at most `similarity_scan_limit` entries. A failed index query
    /// is logged and yields no matches.
    pub async fn find_similar(&self, name: &str, threshold: Option<f64>) -> Vec<SimilarIngredient> {
        let normalized = normalize(name);
        let threshold = threshold.unwrap_or(self.config.dedup_threshold);

        let items = match self
            .store
            .query(GSI1, &all_ingredients(), self.config.similarity_scan_limit)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(error = %e, name = %normalized, "Similarity scan failed");
                return Vec::new();
            }
        };

        rank_matches(&normalized, items.iter().filter_map(candidate), threshold)
    }

    /// Resolve `raw_name` to a master entry, creating one if needed, and
    /// record the reference from `source_id`.
    ///
    /// Only failures to create a new entry are returned; read-path and
    /// increment failures are logged and absorbed. With an operation timeout
    /// configured, an overrun returns [`LarderError::Timeout`].
    pub async fn save_ingredient(
        &self,
        raw_name: &str,
        source_id: &str,
    ) -> LarderResult<SaveOutcome> {
        match self.config.operation_timeout {
            Some(after) => tokio::time::timeout(after, self.resolve(raw_name, source_id))
                .await
                .map_err(|_| LarderError::Timeout {
                    operation: "save_ingredient".to_string(),
                    after,
                })?,
            None => self.resolve(raw_name, source_id).await,
        }
    }

    /// Resolve every name of one source record, in order.
    ///
    /// Stops at the first error.
    pub async fn save_ingredients<I, T>(
        &self,
        raw_names: I,
        source_id: &str,
    ) -> LarderResult<Vec<SaveOutcome>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut outcomes = Vec::new();
        for raw_name in raw_names {
            outcomes.push(self.save_ingredient(raw_name.as_ref(), source_id).await?);
        }
        Ok(outcomes)
    }

    async fn resolve(&self, raw_name: &str, source_id: &str) -> LarderResult<SaveOutcome> {
        let normalized = normalize(raw_name);
        let id = generate_id(&normalized);
        if id.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "id".to_string(),
            }
            .into());
        }

        match self.store.get(&ingredient_key(&id)).await {
            Ok(Some(_)) => {
                self.increment_usage(&id, source_id).await;
                return Ok(SaveOutcome::reused(id));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, ingredient_id = %id, "Ingredient lookup failed");
            }
        }

        let similar = self
            .find_similar(&normalized, Some(self.config.dedup_threshold))
            .await;
        if let Some(best) = similar.into_iter().next() {
            tracing::debug!(
                name = %normalized,
                matched_id = %best.id,
                score = best.score,
                "Resolved near-duplicate ingredient"
            );
            self.increment_usage(&best.id, source_id).await;
            return Ok(SaveOutcome::reused(best.id));
        }

        let category = self.categorize(&normalized);
        let ingredient = MasterIngredient::new(id.as_str(), normalized, category, source_id);
        let item = ingredient_item(&ingredient)?;

        match self.store.put(item, PutCondition::IfNotExists).await {
            Ok(()) => {
                tracing::info!(
                    ingredient_id = %id,
                    name = %ingredient.name,
                    category = %category,
                    "Created master ingredient"
                );
                Ok(SaveOutcome::created(id))
            }
            Err(e) if e.is_condition_failed() => {
                // Another writer created the same id after our lookup
                self.increment_usage(&id, source_id).await;
                Ok(SaveOutcome::reused(id))
            }
            Err(e) => {
                tracing::error!(error = %e, ingredient_id = %id, "Failed to create master ingredient");
                Err(e)
            }
        }
    }

    /// Atomically add one use of `id` by `source_id`. Failures are logged.
    pub async fn increment_usage(&self, id: &str, source_id: &str) {
        let update = usage_update(source_id, Utc::now());
        match self.store.update(&ingredient_key(id), &update).await {
            Ok(item) => tracing::debug!(
                ingredient_id = %id,
                usage_count = ?item.get_i64(USAGE_COUNT_ATTR),
                "Incremented ingredient usage"
            ),
            Err(e) => tracing::error!(
                error = %e,
                ingredient_id = %id,
                source_id = %source_id,
                "Failed to increment ingredient usage"
            ),
        }
    }

    /// Point lookup of a master entry.
    pub async fn get_ingredient(&self, id: &str) -> LarderResult<Option<MasterIngredient>> {
        self.store
            .get(&ingredient_key(id))
            .await?
            .map(|item| ingredient_from_item(&item))
            .transpose()
    }

    /// Up to `limit` master entries ordered by name.
    pub async fn list_ingredients(&self, limit: usize) -> LarderResult<Vec<MasterIngredient>> {
        let items = self.store.query(GSI1, &all_ingredients(), limit).await?;
        items.iter().map(ingredient_from_item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_storage::{InMemoryStore, StoreOperation};
    use std::time::Duration;

    fn normalizer() -> (IngredientNormalizer<InMemoryStore>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (IngredientNormalizer::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_first_save_creates() {
        let (normalizer, _) = normalizer();
        let outcome = normalizer.save_ingredient("THỊT BÒ", "recipe-1").await.unwrap();
        assert_eq!(outcome, SaveOutcome::created("thit-bo"));

        let stored = normalizer.get_ingredient("thit-bo").await.unwrap().unwrap();
        assert_eq!(stored.name, "thịt bò");
        assert_eq!(stored.category, IngredientCategory::Protein);
        assert_eq!(stored.usage_count, 1);
        assert_eq!(stored.first_used_in, "recipe-1");
    }

    #[tokio::test]
    async fn test_exact_id_skips_similarity_scan() {
        let (normalizer, store) = normalizer();
        normalizer.save_ingredient("cà chua", "r1").await.unwrap();
        let scans = store.call_count(StoreOperation::Query);

        let outcome = normalizer.save_ingredient("Cà  Chua", "r2").await.unwrap();
        assert_eq!(outcome, SaveOutcome::reused("ca-chua"));
        assert_eq!(store.call_count(StoreOperation::Query), scans);
    }

    #[tokio::test]
    async fn test_near_duplicate_resolves_to_best_match() {
        let (normalizer, _) = normalizer();
        normalizer.save_ingredient("mì ống spaghetti", "r1").await.unwrap();

        // different slug, one edit over sixteen chars
        let outcome = normalizer.save_ingredient("mì ống spagheti", "r2").await.unwrap();
        assert_eq!(outcome, SaveOutcome::reused("mi-ong-spaghetti"));
        assert!(normalizer.get_ingredient("mi-ong-spagheti").await.unwrap().is_none());

        let stored = normalizer.get_ingredient("mi-ong-spaghetti").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 2);
        assert_eq!(stored.last_used_in, "r2");
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let (normalizer, store) = normalizer();
        for raw in ["", "   ", "(((", "日本"] {
            let err = normalizer.save_ingredient(raw, "r1").await.unwrap_err();
            assert!(matches!(err, LarderError::Validation(_)), "{:?}", raw);
        }
        assert_eq!(store.call_count(StoreOperation::Get), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_create() {
        let (normalizer, store) = normalizer();
        store.fail_on(StoreOperation::Get);
        store.fail_on(StoreOperation::Query);

        let outcome = normalizer.save_ingredient("gừng", "r1").await.unwrap();
        assert!(outcome.is_new);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_with_existing_entry_is_not_new() {
        let (normalizer, store) = normalizer();
        normalizer.save_ingredient("gừng", "r1").await.unwrap();
        store.fail_on(StoreOperation::Get);
        store.fail_on(StoreOperation::Query);

        // both reads miss, so only the conditional create sees the existing id
        let outcome = normalizer.save_ingredient("gừng", "r2").await.unwrap();
        assert_eq!(outcome, SaveOutcome::reused("gung"));
        assert_eq!(store.call_count(StoreOperation::Put), 2);
        assert_eq!(store.len(), 1);

        store.clear_faults();
        let stored = normalizer.get_ingredient("gung").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 2);
        assert_eq!(stored.first_used_in, "r1");
        assert_eq!(stored.last_used_in, "r2");
    }

    #[tokio::test]
    async fn test_scan_limit_bounds_similarity_search() {
        let store = Arc::new(InMemoryStore::new());
        let normalizer = IngredientNormalizer::with_config(
            Arc::clone(&store),
            LarderConfig::new().with_scan_limit(2),
        )
        .unwrap();
        normalizer
            .save_ingredients(["aaa", "bbb", "zucchini squash"], "r1")
            .await
            .unwrap();

        // ordered by name, so the third entry is past the cap
        assert!(normalizer.find_similar("zucchini squash", None).await.is_empty());
        assert_eq!(normalizer.find_similar("aaa", None).await.len(), 1);

        let outcome = normalizer.save_ingredient("zucchini squas", "r2").await.unwrap();
        assert_eq!(outcome, SaveOutcome::created("zucchini-squas"));
        assert_eq!(normalizer.list_ingredients(10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let (normalizer, store) = normalizer();
        store.fail_on(StoreOperation::Put);

        let err = normalizer.save_ingredient("tỏi", "r1").await.unwrap_err();
        assert!(matches!(err, LarderError::Storage(_)));
    }

    #[tokio::test]
    async fn test_increment_failure_is_swallowed() {
        let (normalizer, store) = normalizer();
        normalizer.save_ingredient("tỏi", "r1").await.unwrap();
        store.fail_on(StoreOperation::Update);

        let outcome = normalizer.save_ingredient("tỏi", "r2").await.unwrap();
        assert_eq!(outcome, SaveOutcome::reused("toi"));

        store.clear_faults();
        let stored = normalizer.get_ingredient("toi").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 1);
    }

    #[tokio::test]
    async fn test_find_similar_default_threshold_and_failure() {
        let (normalizer, store) = normalizer();
        normalizer.save_ingredient("hành tây", "r1").await.unwrap();
        normalizer.save_ingredient("cà rốt", "r1").await.unwrap();

        let matches = normalizer.find_similar("HÀNH TÂY", None).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "hanh-tay");
        assert_eq!(matches[0].score, 1.0);

        assert!(normalizer.find_similar("hành", Some(0.0)).await.len() >= 2);

        store.fail_on(StoreOperation::Query);
        assert!(normalizer.find_similar("hành tây", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_ingredients_in_order() {
        let (normalizer, _) = normalizer();
        let outcomes = normalizer
            .save_ingredients(["tỏi", "gừng", "TỎI"], "recipe-7")
            .await
            .unwrap();
        let ids: Vec<_> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["toi", "gung", "toi"]);
        assert!(outcomes[0].is_new && outcomes[1].is_new && !outcomes[2].is_new);

        let listed = normalizer.list_ingredients(10).await.unwrap();
        let names: Vec<_> = listed.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["gừng", "tỏi"]);
    }

    #[tokio::test]
    async fn test_with_config_validates() {
        let store = Arc::new(InMemoryStore::new());
        let bad = LarderConfig::new().with_dedup_threshold(2.0);
        assert!(IngredientNormalizer::with_config(store, bad).is_err());
    }

    #[tokio::test]
    async fn test_custom_threshold_controls_collapse() {
        let store = Arc::new(InMemoryStore::new());
        let strict = IngredientNormalizer::with_config(
            Arc::clone(&store),
            LarderConfig::new().with_dedup_threshold(1.0),
        )
        .unwrap();

        strict.save_ingredient("mì ống spaghetti", "r1").await.unwrap();
        let outcome = strict.save_ingredient("mì ống spagheti", "r2").await.unwrap();
        assert!(outcome.is_new);
    }

    #[tokio::test]
    async fn test_timeout_configured_fast_path() {
        let store = Arc::new(InMemoryStore::new());
        let normalizer = IngredientNormalizer::with_config(
            store,
            LarderConfig::new().with_operation_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        // a fast store finishes well inside the deadline
        let outcome = normalizer.save_ingredient("sả", "r1").await.unwrap();
        assert!(outcome.is_new);
    }
}

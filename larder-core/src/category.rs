//! Keyword-based ingredient categorization.
//!
//! The taxonomy is data: an ordered list of `{category, keywords}` rules
//! that can be loaded from JSON. The first rule with a keyword contained in
//! the normalized name wins; nothing matching means [`IngredientCategory::Other`].

use crate::error::{ConfigError, LarderResult, ValidationError};
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse ingredient category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientCategory {
    Protein,
    Vegetable,
    Spice,
    Condiment,
    Herb,
    Carb,
    Dairy,
    Other,
}

impl IngredientCategory {
    /// All categories, `Other` last.
    pub const ALL: [IngredientCategory; 8] = [
        IngredientCategory::Protein,
        IngredientCategory::Vegetable,
        IngredientCategory::Spice,
        IngredientCategory::Condiment,
        IngredientCategory::Herb,
        IngredientCategory::Carb,
        IngredientCategory::Dairy,
        IngredientCategory::Other,
    ];

    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngredientCategory::Protein => "protein",
            IngredientCategory::Vegetable => "vegetable",
            IngredientCategory::Spice => "spice",
            IngredientCategory::Condiment => "condiment",
            IngredientCategory::Herb => "herb",
            IngredientCategory::Carb => "carb",
            IngredientCategory::Dairy => "dairy",
            IngredientCategory::Other => "other",
        }
    }
}

impl fmt::Display for IngredientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngredientCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IngredientCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "category".to_string(),
                reason: format!("unknown category '{}'", s),
            })
    }
}

/// One row of the categorization table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: IngredientCategory,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new<I, K>(category: IngredientCategory, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        Self {
            category,
            keywords: keywords
                .into_iter()
                .map(|k| normalize(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

/// Ordered categorization table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
}

impl CategoryTable {
    /// Build a table from rules, normalizing every keyword.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| CategoryRule::new(r.category, r.keywords))
            .collect();
        Self { rules }
    }

    /// Parse a table from its JSON form (`{"rules": [{"category": .., "keywords": [..]}]}`).
    pub fn from_json(json: &str) -> LarderResult<Self> {
        let parsed: CategoryTable =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidValue {
                field: "category_rules".to_string(),
                value: truncate(json, 40),
                reason: e.to_string(),
            })?;
        Ok(Self::new(parsed.rules))
    }

    /// Rules in match order.
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Categorize a raw ingredient name.
    pub fn categorize(&self, raw: &str) -> IngredientCategory {
        let name = normalize(raw);
        if name.is_empty() {
            return IngredientCategory::Other;
        }

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| name.contains(k.as_str())))
            .map(|rule| rule.category)
            .unwrap_or(IngredientCategory::Other)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        // Herbs come before vegetables: "rau mùi" is a herb, "rau muống" a vegetable.
        Self::new(vec![
            CategoryRule::new(
                IngredientCategory::Protein,
                [
                    "thịt", "bò", "gà", "heo", "lợn", "vịt", "cá", "tôm", "mực", "cua",
                    "ghẹ", "nghêu", "sò", "hàu", "trứng", "đậu phụ", "đậu hũ", "sườn",
                    "beef", "pork", "chicken", "duck", "fish", "shrimp", "prawn", "squid",
                    "tofu", "salmon", "tuna",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Herb,
                [
                    "rau mùi", "ngò", "húng", "tía tô", "kinh giới", "rau răm", "thì là",
                    "lá chanh", "lá lốt", "sả", "basil", "cilantro", "coriander", "mint",
                    "parsley", "dill", "lemongrass",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Vegetable,
                [
                    "rau", "cải", "cà chua", "cà rốt", "cà tím", "bắp cải", "su hào",
                    "bí", "mướp", "dưa leo", "dưa chuột", "giá", "nấm", "hành tây",
                    "khoai tây", "đậu que", "măng", "tomato", "carrot", "cabbage",
                    "onion", "potato", "mushroom", "cucumber", "spinach", "lettuce",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Spice,
                [
                    "tiêu", "ớt", "quế", "hồi", "gừng", "nghệ", "tỏi", "ngũ vị",
                    "pepper", "chili", "cinnamon", "ginger", "turmeric", "garlic",
                    "cumin", "paprika",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Condiment,
                [
                    "nước mắm", "mắm", "nước tương", "xì dầu", "tương", "muối", "đường",
                    "giấm", "dầu hào", "dầu ăn", "hạt nêm", "bột ngọt", "sauce", "salt",
                    "sugar", "vinegar", "oil", "ketchup", "mayonnaise",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Carb,
                [
                    "gạo", "cơm", "bún", "phở", "miến", "mì", "bánh phở", "bánh mì",
                    "bột mì", "khoai", "ngô", "rice", "noodle", "pasta", "bread",
                    "flour", "corn",
                ],
            ),
            CategoryRule::new(
                IngredientCategory::Dairy,
                [
                    "sữa", "bơ", "phô mai", "kem", "sữa chua", "milk", "butter",
                    "cheese", "cream", "yogurt",
                ],
            ),
        ])
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

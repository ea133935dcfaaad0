//! Single-table item layout for master ingredients.
//!
//! | Attribute | Value |
//! |-----------|-------|
//! | `PK` | `INGREDIENT#<id>` |
//! | `SK` | `METADATA` |
//! | `GSI1PK` | `INGREDIENT` |
//! | `GSI1SK` | normalized name |
//!
//! The remaining attributes are the camelCase fields of [`MasterIngredient`].

use chrono::SecondsFormat;
use larder_core::{LarderResult, MasterIngredient, Timestamp};
use larder_storage::{Item, ItemKey, KeyCondition, UpdateExpression, GSI1_PK, GSI1_SK};

pub const INGREDIENT_PK_PREFIX: &str = "INGREDIENT#";
pub const METADATA_SK: &str = "METADATA";
/// `GSI1PK` shared by every master ingredient.
pub const INGREDIENT_PARTITION: &str = "INGREDIENT";

pub const ID_ATTR: &str = "id";
pub const NAME_ATTR: &str = "name";
pub const USAGE_COUNT_ATTR: &str = "usageCount";
pub const LAST_USED_IN_ATTR: &str = "lastUsedIn";
pub const UPDATED_AT_ATTR: &str = "updatedAt";

pub fn ingredient_key(id: &str) -> ItemKey {
    ItemKey::new(format!("{}{}", INGREDIENT_PK_PREFIX, id), METADATA_SK)
}

/// Key condition enumerating every master ingredient on `GSI1`.
pub fn all_ingredients() -> KeyCondition {
    KeyCondition::partition(INGREDIENT_PARTITION)
}

pub fn ingredient_item(ingredient: &MasterIngredient) -> LarderResult<Item> {
    Ok(Item::from_record(&ingredient_key(&ingredient.id), ingredient)?
        .with(GSI1_PK, INGREDIENT_PARTITION)
        .with(GSI1_SK, ingredient.name.as_str()))
}

pub fn ingredient_from_item(item: &Item) -> LarderResult<MasterIngredient> {
    item.to_record()
}

/// `(id, name)` of an index entry, if both attributes are present.
pub fn candidate(item: &Item) -> Option<(&str, &str)> {
    Some((item.get_str(ID_ATTR)?, item.get_str(NAME_ATTR)?))
}

/// One atomic usage increment: `ADD usageCount 1`, `SET lastUsedIn, updatedAt`.
pub fn usage_update(source_id: &str, now: Timestamp) -> UpdateExpression {
    UpdateExpression::new()
        .add(USAGE_COUNT_ATTR, 1)
        .set(LAST_USED_IN_ATTR, source_id)
        .set(
            UPDATED_AT_ATTR,
            now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
}

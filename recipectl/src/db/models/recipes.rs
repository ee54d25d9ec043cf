//! Database models for recipes.

use crate::db::models::labels::LabelDBResponse;
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Number of decimal places prices are stored and rendered with.
pub const PRICE_SCALE: u32 = 2;

/// Render a price the way it is stored: rounded and padded to [`PRICE_SCALE`] places.
pub fn normalize_price(price: Decimal) -> Decimal {
    let mut price = price.round_dp(PRICE_SCALE);
    price.rescale(PRICE_SCALE);
    price
}

/// Database request for creating a recipe together with its relations
#[derive(Debug, Clone)]
pub struct RecipeCreateDBRequest {
    pub user_id: UserId,
    pub title: String,
    pub time_minutes: i64,
    pub price: Decimal,
    pub link: String,
    pub tag_ids: Vec<TagId>,
    pub ingredient_ids: Vec<IngredientId>,
}

/// Database request for updating a recipe.
///
/// Scalar fields left as `None` are unchanged. A relation list given as `Some` replaces the
/// existing set entirely.
#[derive(Debug, Clone, Default)]
pub struct RecipeUpdateDBRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tag_ids: Option<Vec<TagId>>,
    pub ingredient_ids: Option<Vec<IngredientId>>,
}

/// Database response for a recipe, with its related tags and ingredients loaded
#[derive(Debug, Clone)]
pub struct RecipeDBResponse {
    pub id: RecipeId,
    pub user_id: UserId,
    pub title: String,
    pub time_minutes: i64,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<LabelDBResponse>,
    pub ingredients: Vec<LabelDBResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
